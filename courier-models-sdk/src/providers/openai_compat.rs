//! Wire types shared by adapters whose upstream speaks the OpenAI
//! chat-completions dialect (Groq, HuggingFace router).
//!
//! Upstreams are lenient about optional fields, so the wire structs accept
//! partial responses and [`normalize`] fills the gaps: missing usage is
//! estimated, missing ids and timestamps are synthesized.

use crate::error::ProviderError;
use crate::models::{
    estimate_prompt_tokens, estimate_tokens, ChatRequest, ChatResponse, Choice, Message, Role,
    Usage,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WireChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct WireChoice {
    #[serde(default)]
    pub index: Option<u32>,
    pub message: WireMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Convert a wire response into the normalized shape, estimating token
/// counts the upstream did not report.
pub fn normalize(
    wire: WireChatResponse,
    request: &ChatRequest,
) -> Result<ChatResponse, ProviderError> {
    if wire.choices.is_empty() {
        return Err(ProviderError::Malformed {
            message: "upstream response contained no choices".to_string(),
        });
    }

    let choices: Vec<Choice> = wire
        .choices
        .into_iter()
        .enumerate()
        .map(|(i, choice)| Choice {
            index: choice.index.unwrap_or(i as u32),
            message: Message {
                role: choice.message.role.unwrap_or(Role::Assistant),
                content: choice.message.content.unwrap_or_default(),
            },
            finish_reason: choice.finish_reason,
        })
        .collect();

    let usage = resolve_usage(wire.usage, request, &choices);

    Ok(ChatResponse {
        id: wire
            .id
            .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
        object: "chat.completion".to_string(),
        created: wire
            .created
            .unwrap_or_else(|| chrono::Utc::now().timestamp() as u64),
        model: wire.model.unwrap_or_else(|| request.model.clone()),
        choices,
        usage,
        routing_metadata: None,
    })
}

fn resolve_usage(wire: Option<WireUsage>, request: &ChatRequest, choices: &[Choice]) -> Usage {
    let estimated_prompt = || estimate_prompt_tokens(&request.messages);
    let estimated_completion = || {
        choices
            .iter()
            .map(|c| estimate_tokens(&c.message.content))
            .sum()
    };

    match wire {
        Some(usage) => {
            let prompt = usage.prompt_tokens.unwrap_or_else(estimated_prompt);
            let completion = usage.completion_tokens.unwrap_or_else(estimated_completion);
            Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                // Trust the upstream total only when it reported one.
                total_tokens: usage.total_tokens.unwrap_or(prompt + completion),
            }
        }
        None => Usage::from_counts(estimated_prompt(), estimated_completion()),
    }
}
