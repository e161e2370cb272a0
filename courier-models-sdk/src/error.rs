//! # Error Types
//!
//! Typed errors for provider adapters and the router core.
//!
//! Adapters MUST map vendor-specific failure signals onto the closed
//! [`ErrorKind`] set; the router only ever reasons about kinds, never about
//! vendor payloads. Router-level errors ([`RouterError`]) are produced once
//! the failover loop ends and carry the full attempt trail.

use crate::models::AttemptRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed classification of upstream failures.
///
/// Every adapter error collapses to exactly one of these kinds; health
/// samples and attempt records carry the kind rather than the raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream rejected the credential (401/403)
    InvalidCredential,
    /// Upstream applied its own rate limit (429)
    UpstreamRateLimited,
    /// Upstream temporarily unavailable (5xx, model loading)
    UpstreamUnavailable,
    /// Adapter or router deadline expired
    UpstreamTimeout,
    /// Upstream returned a response we could not parse
    UpstreamMalformed,
    /// Anything else
    UpstreamOther,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::UpstreamRateLimited => "upstream_rate_limited",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamMalformed => "upstream_malformed",
            ErrorKind::UpstreamOther => "upstream_other",
        }
    }
}

/// Provider-level errors raised by adapters.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid or rejected upstream API key
    #[error("invalid upstream credential")]
    InvalidCredential,

    /// Upstream rate limit hit
    #[error("upstream rate limited")]
    RateLimited,

    /// Upstream temporarily unavailable (e.g. model still loading)
    #[error("upstream unavailable: {message}")]
    Unavailable { message: String },

    /// Request exceeded the adapter-internal timeout
    #[error("upstream timeout")]
    Timeout,

    /// Upstream response did not match the expected shape
    #[error("malformed upstream response: {message}")]
    Malformed { message: String },

    /// HTTP transport failure
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Uncategorized upstream API error
    #[error("upstream error: {code} - {message}")]
    Api { code: u16, message: String },

    /// Invalid or missing adapter configuration
    #[error("provider configuration error: {message}")]
    Configuration { message: String },
}

impl ProviderError {
    /// Collapse this error onto the closed [`ErrorKind`] set.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::InvalidCredential => ErrorKind::InvalidCredential,
            ProviderError::RateLimited => ErrorKind::UpstreamRateLimited,
            ProviderError::Unavailable { .. } => ErrorKind::UpstreamUnavailable,
            ProviderError::Timeout => ErrorKind::UpstreamTimeout,
            ProviderError::Malformed { .. } => ErrorKind::UpstreamMalformed,
            ProviderError::Http(e) => {
                if e.is_timeout() {
                    ErrorKind::UpstreamTimeout
                } else if e.is_connect() {
                    ErrorKind::UpstreamUnavailable
                } else {
                    ErrorKind::UpstreamOther
                }
            }
            ProviderError::Api { .. } | ProviderError::Configuration { .. } => {
                ErrorKind::UpstreamOther
            }
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Malformed {
            message: e.to_string(),
        }
    }
}

/// Errors produced by the router core once the failover loop ends.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The candidate list was empty after tenant and breaker filtering
    #[error("no providers available")]
    NoProvidersAvailable,

    /// Every ordered provider failed; the attempt trail is attached
    #[error("all providers failed after {} attempt(s)", attempts.len())]
    AllProvidersFailed {
        attempts: Vec<AttemptRecord>,
        last_error: ErrorKind,
    },
}
