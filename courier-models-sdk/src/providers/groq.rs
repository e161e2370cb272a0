use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse};
use crate::providers::{PingReport, Provider, ProviderDescriptor};
use std::time::Instant;

use super::http_client::{AuthStrategy, HttpProviderClient};
use super::openai_compat;

const DEFAULT_BASE: &str = "https://api.groq.com/openai/v1";

/// Groq adapter. The upstream speaks the OpenAI chat-completions dialect, so
/// translation is mostly a passthrough plus usage normalization.
pub struct GroqProvider {
    name: String,
    http: HttpProviderClient,
}

impl GroqProvider {
    pub fn new(descriptor: &ProviderDescriptor, api_key: String) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            descriptor.timeout(),
            descriptor.endpoint.clone(),
            DEFAULT_BASE,
            AuthStrategy::Bearer { token: api_key },
        )?;

        Ok(Self {
            name: descriptor.name.clone(),
            http,
        })
    }
}

#[async_trait::async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut outbound = request.clone();
        outbound.stream = None;

        let wire: openai_compat::WireChatResponse =
            self.http.post_json("/chat/completions", &outbound).await?;
        openai_compat::normalize(wire, &request)
    }

    async fn ping(&self) -> PingReport {
        let start = Instant::now();
        let result = self.http.get_json::<serde_json::Value>("/models").await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => PingReport::healthy(latency_ms),
            Err(e) => PingReport::unhealthy(latency_ms, e.kind()),
        }
    }
}
