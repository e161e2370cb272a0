//! # Normalized Chat Types
//!
//! This module defines the canonical, OpenAI-compatible data structures that
//! travel through the gateway: chat requests, chat responses, and the routing
//! metadata attached to every completed request.
//!
//! ## Overview
//!
//! Every provider adapter translates between these types and its vendor wire
//! format, so the rest of the system never sees vendor-specific JSON:
//!
//! - **ChatRequest / ChatResponse**: the normalized chat-completion shape
//! - **Message / Role**: ordered conversation turns
//! - **Usage**: token accounting, estimated when the upstream omits it
//! - **AttemptRecord / RoutingMetadata**: the failover trail attached to
//!   every response by the router core
//!
//! ## Example
//!
//! ```rust
//! use courier_models_sdk::models::{ChatRequest, Message};
//!
//! let request = ChatRequest {
//!     model: "gpt-3.5-turbo".to_string(),
//!     messages: vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Hello!"),
//!     ],
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

/// Chat completion request in the gateway's canonical shape.
///
/// The `model` field is a hint forwarded to the selected provider; the
/// provider decides how to interpret it. `stream` is accepted for
/// compatibility with OpenAI clients but the gateway always returns the
/// response whole.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    /// The model to use for completion
    pub model: String,
    /// The messages to generate a response for
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Controls randomness (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Controls diversity via nucleus sampling (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Accepted for client compatibility; responses are never streamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Chat completion response in the gateway's canonical shape.
///
/// `routing_metadata` is absent on the provider wire and attached by the
/// router core once an attempt succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for the completion
    pub id: String,
    /// Object type (always "chat.completion")
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for completion
    pub model: String,
    /// Generated completions
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Usage,
    /// Failover trail attached by the router core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_metadata: Option<RoutingMetadata>,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions and context
    System,
    /// User input and questions
    User,
    /// AI assistant responses
    Assistant,
}

/// A generated completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of the choice in the response
    pub index: u32,
    /// The generated message
    pub message: Message,
    /// Reason why generation stopped
    pub finish_reason: Option<String>,
}

/// Token usage statistics for a completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from separate prompt and completion counts, keeping the
    /// `total = prompt + completion` invariant.
    pub fn from_counts(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Rough token estimate for upstreams that do not report usage:
/// `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Estimate the prompt-side token count of a request.
pub fn estimate_prompt_tokens(messages: &[Message]) -> u32 {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Outcome of a single outbound call to one provider within one client
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Provider that was tried
    pub provider: String,
    /// Whether the attempt succeeded or failed
    pub status: AttemptStatus,
    /// Wall-clock duration of the attempt in milliseconds
    pub duration_ms: u64,
    /// Error message for failed attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Attempt outcome tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// Routing trail attached to every successful response.
///
/// Attempts are recorded in the order they were tried, the successful one
/// last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    /// Provider that produced the response
    pub primary_provider: String,
    /// Every attempt made for this request, in order
    pub attempts: Vec<AttemptRecord>,
    /// Total time spent in the failover loop, in milliseconds
    pub total_processing_time: u64,
    /// Name of the policy that ordered the candidates
    pub policy_used: String,
    /// End-to-end gateway processing time, filled in by the HTTP layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_processing_time: Option<u64>,
    /// ISO-8601 timestamp of the routing decision
    pub timestamp: String,
    /// Tenant the request was routed for
    pub tenant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("hello world!"), 3);
    }

    #[test]
    fn usage_total_is_sum_of_parts() {
        let usage = Usage::from_counts(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = Message::assistant("hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn stream_flag_is_optional_and_preserved() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}],"stream":true}"#,
        )
        .unwrap();
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.messages.len(), 1);
    }
}
