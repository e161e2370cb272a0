//! # Provider System Module
//!
//! The adapter layer between the gateway's normalized chat shape and the
//! upstream LLM vendors. Every upstream is reached through the [`Provider`]
//! trait, which exposes exactly two capabilities:
//!
//! - [`Provider::chat_completion`]: perform the upstream call and return a
//!   normalized response, or fail with a typed [`ProviderError`]
//! - [`Provider::ping`]: a small synthetic call suitable for health probing
//!
//! Adapters translate request and response formats, attach authentication,
//! and enforce their own request timeout. They never retry; failover is the
//! router core's job. Concrete adapters are created through
//! [`create_provider`], keyed by the descriptor's `type` tag.

use crate::error::{ErrorKind, ProviderError};
use crate::health::SampleStatus;
use crate::models::{ChatRequest, ChatResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod gemini;
pub mod groq;
pub mod http_client;
pub mod huggingface;
pub mod openai_compat;

/// Default adapter-internal request timeout, milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 12_000;

/// Static configuration for one upstream provider, loaded from
/// `providers.json`. The `name` is the map key and acts as the primary key;
/// the secret itself is resolved from the environment variable named by
/// `api_key_env` and never lives in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name (filled from the config map key)
    #[serde(default)]
    pub name: String,
    /// Which adapter implementation to instantiate
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Base URL override; each adapter has a vendor default
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the upstream API key
    pub api_key_env: String,
    /// Disabled descriptors are loaded but never instantiated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cost per token used by the policy engine
    #[serde(default)]
    pub cost_per_token: Option<f64>,
    /// Adapter-internal request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ProviderDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Adapter implementations the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Groq,
    Huggingface,
}

/// Result of a health probe.
#[derive(Debug, Clone, Serialize)]
pub struct PingReport {
    pub status: SampleStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl PingReport {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            status: SampleStatus::Healthy,
            latency_ms,
            error_kind: None,
        }
    }

    pub fn unhealthy(latency_ms: u64, error_kind: ErrorKind) -> Self {
        Self {
            status: SampleStatus::Unhealthy,
            latency_ms,
            error_kind: Some(error_kind),
        }
    }
}

/// Capability contract every upstream adapter satisfies.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name, matching the descriptor.
    fn name(&self) -> &str;

    /// Perform a chat completion against the upstream.
    ///
    /// Vendor error signals MUST be mapped to the typed [`ProviderError`]
    /// variants; the adapter enforces its own request timeout and never
    /// retries.
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Cheap synthetic call for health probing (a minimal prompt or a
    /// metadata request, well under 10 tokens).
    async fn ping(&self) -> PingReport;
}

/// Build a provider instance from its descriptor and resolved secret.
///
/// Callers are expected to have checked `enabled` and resolved the secret
/// from `api_key_env` before getting here.
pub fn create_provider(
    descriptor: &ProviderDescriptor,
    api_key: String,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match descriptor.kind {
        ProviderKind::Gemini => Ok(Arc::new(gemini::GeminiProvider::new(descriptor, api_key)?)),
        ProviderKind::Groq => Ok(Arc::new(groq::GroqProvider::new(descriptor, api_key)?)),
        ProviderKind::Huggingface => Ok(Arc::new(huggingface::HuggingFaceProvider::new(
            descriptor, api_key,
        )?)),
    }
}
