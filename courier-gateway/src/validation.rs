//! Request-schema validation for the chat endpoint.
//!
//! The body is parsed from raw bytes rather than through the extractor so
//! malformed JSON surfaces as the standard `validation_error` envelope
//! instead of a framework default.

use courier_models_sdk::models::{ChatRequest, Role};

use crate::gateway_error::GatewayError;

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_CAP: u32 = 4000;

/// Parse and validate a chat request body.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    let request: ChatRequest =
        serde_json::from_slice(body).map_err(|e| GatewayError::Validation {
            message: format!("invalid request body: {e}"),
        })?;
    validate_chat_request(&request)?;
    Ok(request)
}

fn validate_chat_request(request: &ChatRequest) -> Result<(), GatewayError> {
    if request.model.trim().is_empty() {
        return Err(validation("model is required"));
    }

    if request.messages.is_empty() {
        return Err(validation("messages must contain at least one entry"));
    }

    for (i, message) in request.messages.iter().enumerate() {
        if message.content.is_empty() {
            return Err(validation(format!("messages[{i}].content must not be empty")));
        }
    }

    // The upstreams are single-turn providers; a conversation with no user
    // turn has nothing for them to answer.
    if !request.messages.iter().any(|m| m.role == Role::User) {
        return Err(validation(
            "messages must contain at least one user-role message",
        ));
    }

    if let Some(max_tokens) = request.max_tokens {
        if !(1..=MAX_TOKENS_CAP).contains(&max_tokens) {
            return Err(validation(format!(
                "max_tokens must be between 1 and {MAX_TOKENS_CAP}"
            )));
        }
    }

    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(validation("temperature must be between 0 and 2"));
        }
    }

    if let Some(top_p) = request.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(validation("top_p must be between 0 and 1"));
        }
    }

    Ok(())
}

fn validation(message: impl Into<String>) -> GatewayError {
    GatewayError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> Vec<u8> {
        json.to_string().into_bytes()
    }

    #[test]
    fn valid_request_passes() {
        let request = parse_chat_request(&body(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 100,
            "temperature": 0.7,
            "top_p": 0.9,
            "stream": false
        })))
        .unwrap();
        assert_eq!(request.model, "gpt-3.5-turbo");
    }

    #[test]
    fn broken_json_is_a_validation_error() {
        let err = parse_chat_request(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = parse_chat_request(&body(serde_json::json!({
            "model": "m",
            "messages": [{"role": "wizard", "content": "cast"}]
        })))
        .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn conversations_without_a_user_turn_are_rejected() {
        let err = parse_chat_request(&body(serde_json::json!({
            "model": "m",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "assistant", "content": "Understood."}
            ]
        })))
        .unwrap_err();
        assert!(err.to_string().contains("user"));

        // A user turn anywhere in the list satisfies the rule.
        parse_chat_request(&body(serde_json::json!({
            "model": "m",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .unwrap();
    }

    #[test]
    fn empty_messages_are_rejected() {
        let err = parse_chat_request(&body(serde_json::json!({
            "model": "m",
            "messages": []
        })))
        .unwrap_err();
        assert!(err.to_string().contains("messages"));
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        for (field, value) in [
            ("max_tokens", serde_json::json!(0)),
            ("max_tokens", serde_json::json!(4001)),
            ("temperature", serde_json::json!(2.5)),
            ("top_p", serde_json::json!(1.5)),
        ] {
            let mut request = serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}]
            });
            request[field] = value;
            assert!(
                parse_chat_request(&body(request)).is_err(),
                "expected {field} to be rejected"
            );
        }
    }
}
