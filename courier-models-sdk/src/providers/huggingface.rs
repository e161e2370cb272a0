use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse};
use crate::providers::{PingReport, Provider, ProviderDescriptor};
use std::time::Instant;

use super::http_client::{AuthStrategy, HttpProviderClient};
use super::openai_compat;

const DEFAULT_BASE: &str = "https://router.huggingface.co/v1";

/// HuggingFace inference router adapter.
///
/// The router speaks the OpenAI chat dialect, but serverless models may still
/// be cold: a 503 with an `estimated_time` hint means the model is loading,
/// which surfaces as `UPSTREAM_UNAVAILABLE` so the failover loop moves on.
pub struct HuggingFaceProvider {
    name: String,
    http: HttpProviderClient,
}

impl HuggingFaceProvider {
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
impl Provider for HuggingFaceProvider {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Message;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(server: &MockServer) -> ProviderDescriptor {
        serde_json::from_value(serde_json::json!({
            "name": "huggingface",
            "type": "huggingface",
            "endpoint": server.uri(),
            "api_key_env": "HF_API_KEY",
            "timeout_ms": 2000
        }))
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "meta-llama/Llama-3.1-8B-Instruct".to_string(),
            messages: vec![Message::user("Hello")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn model_loading_503_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "Model is currently loading"},
                "estimated_time": 20.0
            })))
            .mount(&server)
            .await;

        let provider =
            HuggingFaceProvider::new(&descriptor(&server), "hf-test".to_string()).unwrap();
        let err = provider.chat_completion(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("loading"));
    }

    #[tokio::test]
    async fn usage_is_estimated_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Four score"}
                }]
            })))
            .mount(&server)
            .await;

        let provider =
            HuggingFaceProvider::new(&descriptor(&server), "hf-test".to_string()).unwrap();
        let response = provider.chat_completion(request()).await.unwrap();

        assert!(response.usage.total_tokens > 0);
        assert_eq!(
            response.usage.total_tokens,
            response.usage.prompt_tokens + response.usage.completion_tokens
        );
    }
}
