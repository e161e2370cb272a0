use crate::error::ProviderError;
use crate::models::{
    estimate_prompt_tokens, estimate_tokens, ChatRequest, ChatResponse, Choice, Message, Role,
    Usage,
};
use crate::providers::{PingReport, Provider, ProviderDescriptor};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::http_client::{AuthStrategy, HttpProviderClient};

const DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROBE_MODEL: &str = "gemini-1.5-flash";

/// Gemini adapter: translates the normalized chat shape to the
/// `generateContent` API and back.
///
/// Gemini has no system role on the wire; system messages become the
/// `systemInstruction` block, user stays `user`, assistant becomes `model`.
pub struct GeminiProvider {
    name: String,
    http: HttpProviderClient,
}

impl GeminiProvider {
    pub fn new(descriptor: &ProviderDescriptor, api_key: String) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            descriptor.timeout(),
            descriptor.endpoint.clone(),
            DEFAULT_BASE,
            AuthStrategy::Header {
                name: "x-goog-api-key".to_string(),
                value: api_key,
            },
        )?;

        Ok(Self {
            name: descriptor.name.clone(),
            http,
        })
    }

    fn convert_request(request: &ChatRequest) -> GeminiRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => system_parts.push(GeminiPart {
                    text: message.content.clone(),
                }),
                Role::User => contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![GeminiPart {
                        text: message.content.clone(),
                    }],
                }),
                Role::Assistant => contents.push(GeminiContent {
                    role: "model".to_string(),
                    parts: vec![GeminiPart {
                        text: message.content.clone(),
                    }],
                }),
            }
        }

        GeminiRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiSystemInstruction {
                    parts: system_parts,
                })
            },
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn convert_response(
        &self,
        response: GeminiResponse,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed {
                message: "gemini response contained no candidates".to_string(),
            })?;

        let content: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = match response.usage_metadata {
            Some(meta) => {
                let prompt = meta.prompt_token_count.unwrap_or(0);
                let completion = meta.candidates_token_count.unwrap_or(0);
                Usage {
                    prompt_tokens: prompt,
                    completion_tokens: completion,
                    total_tokens: meta.total_token_count.unwrap_or(prompt + completion),
                }
            }
            None => Usage::from_counts(
                estimate_prompt_tokens(&request.messages),
                estimate_tokens(&content),
            ),
        };

        Ok(ChatResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp() as u64,
            model: request.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: Message {
                    role: Role::Assistant,
                    content,
                },
                finish_reason: candidate.finish_reason.map(map_finish_reason),
            }],
            usage,
            routing_metadata: None,
        })
    }
}

fn map_finish_reason(reason: String) -> String {
    match reason.as_str() {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        "SAFETY" | "RECITATION" => "content_filter".to_string(),
        other => other.to_lowercase(),
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let gemini_request = Self::convert_request(&request);
        let path = format!("/models/{}:generateContent", request.model);

        let gemini_response: GeminiResponse = self.http.post_json(&path, &gemini_request).await?;
        self.convert_response(gemini_response, &request)
    }

    async fn ping(&self) -> PingReport {
        let probe = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: "ping".to_string(),
                }],
            }],
            system_instruction: None,
            generation_config: GeminiGenerationConfig {
                temperature: Some(0.0),
                top_p: None,
                max_output_tokens: Some(1),
            },
        };

        let start = Instant::now();
        let path = format!("/models/{PROBE_MODEL}:generateContent");
        let result = self
            .http
            .post_json::<_, serde_json::Value>(&path, &probe)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => PingReport::healthy(latency_ms),
            Err(e) => PingReport::unhealthy(latency_ms, e.kind()),
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: Option<u32>,
}
