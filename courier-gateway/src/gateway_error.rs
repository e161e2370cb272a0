//! # Gateway Error Types
//!
//! The gateway-level error taxonomy and its HTTP mapping. Every non-2xx
//! response uses the same envelope:
//!
//! ```json
//! {"error": {"message": "...", "type": "...", "details": {...}}}
//! ```
//!
//! | type | status |
//! |---|---|
//! | `validation_error` | 400 |
//! | `authentication_error` | 401 |
//! | `rate_limited` | 429 (with `X-RateLimit-*` headers) |
//! | `quota_exceeded` | 429 |
//! | `no_providers_available` | 503 |
//! | `all_providers_failed` | 502 (attempt details in `details.attempts`) |
//! | `internal_error` | 500 |
//!
//! Messages never contain API keys or prompt text; when a key must be
//! referenced it is truncated to a short prefix.

use axum::http::{header::HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use courier_models_sdk::error::RouterError;

/// Gateway-level errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed request body or out-of-range parameter
    #[error("{message}")]
    Validation { message: String },

    /// Missing, malformed, or unknown API key
    #[error("{message}")]
    Authentication { message: String },

    /// Tenant rate window exceeded
    #[error("rate limit exceeded: {limit} requests per window")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_epoch_secs: u64,
    },

    /// Daily or monthly quota exhausted
    #[error("{message}")]
    QuotaExceeded { message: String },

    /// Routing failures from the SDK core
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Unexpected failure inside the gateway itself
    #[error("internal server error")]
    Internal { message: String },
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal {
            message: message.into(),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation_error",
            GatewayError::Authentication { .. } => "authentication_error",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::QuotaExceeded { .. } => "quota_exceeded",
            GatewayError::Router(RouterError::NoProvidersAvailable) => "no_providers_available",
            GatewayError::Router(RouterError::AllProvidersFailed { .. }) => "all_providers_failed",
            GatewayError::Internal { .. } => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } | GatewayError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GatewayError::Router(RouterError::NoProvidersAvailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Router(RouterError::AllProvidersFailed { .. }) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        if let GatewayError::Internal { message } = &self {
            // The client gets a generic message; the details go to the log.
            tracing::error!(error = %message, "internal gateway error");
        }

        let details = match &self {
            GatewayError::Router(RouterError::AllProvidersFailed {
                attempts,
                last_error,
            }) => Some(json!({
                "attempts": attempts,
                "last_error": last_error,
            })),
            _ => None,
        };

        let mut body = json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
            }
        });
        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimited {
            limit,
            remaining,
            reset_epoch_secs,
        } = &self
        {
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(*limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(*remaining),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(*reset_epoch_secs),
            );
        }

        response
    }
}

/// Redact an API key down to a loggable prefix.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{prefix}…")
}
