use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use interview_core::model::Role;

use crate::error::BackendError;
use crate::http::{check_status, join_url, sse_fragments, Delta};
use crate::request::{GenerationRequest, HttpBackendConfig};
use crate::{FragmentStream, GenerationBackend};

const API_VERSION: &str = "2023-06-01";

/// Anthropic `messages` streaming backend.
#[derive(Debug)]
pub struct AnthropicBackend {
    http: Client,
    config: HttpBackendConfig,
}

impl AnthropicBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        join_url(&self.config.base_url, "/messages")
    }
}

/// Request body. System turns move to the `system` field, and a history
/// without any User turn is replaced by the opening prompt.
pub fn build_payload(model: &str, request: &GenerationRequest) -> Value {
    let messages: Vec<Value> = if request.has_user_turn() {
        request
            .turns
            .iter()
            .filter(|t| t.role != Role::System)
            .map(|t| json!({"role": t.role.as_str(), "content": t.content}))
            .collect()
    } else {
        vec![json!({"role": "user", "content": request.opening_prompt})]
    };

    let mut payload = json!({
        "model": model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "stream": true,
    });
    if let Some(system) = request.effective_system_prompt() {
        payload["system"] = json!(system);
    }
    if let Some(temperature) = request.temperature {
        payload["temperature"] = json!(temperature);
    }
    payload
}

pub(crate) fn parse_delta(value: &Value) -> Result<Delta, BackendError> {
    match value.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => {
            let delta = value.get("delta");
            let is_text = delta
                .and_then(|d| d.get("type"))
                .and_then(Value::as_str)
                .is_some_and(|t| t == "text_delta");
            match delta.and_then(|d| d.get("text")).and_then(Value::as_str) {
                Some(text) if is_text => Ok(Delta::Text(text.to_string())),
                _ => Ok(Delta::Skip),
            }
        }
        Some("message_stop") => Ok(Delta::Stop),
        Some("error") => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(BackendError::Stream(message.to_string()))
        }
        _ => Ok(Delta::Skip),
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        let payload = build_payload(&self.config.model, request);
        tracing::debug!(
            "POST {} ({} messages)",
            self.endpoint(),
            request.turns.len()
        );
        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(sse_fragments(response, parse_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::model::Turn;

    #[test]
    fn test_opening_request_uses_opening_prompt() {
        let request = GenerationRequest::new(vec![Turn::system("Interview me.")], 512)
            .opening_prompt("Please begin the interview.");
        let payload = build_payload("claude-3-haiku", &request);
        assert_eq!(payload["system"], "Interview me.");
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Please begin the interview.");
    }

    #[test]
    fn test_system_turns_are_lifted_out() {
        let request = GenerationRequest::new(
            vec![
                Turn::system("Interview me."),
                Turn::assistant("What do you study?"),
                Turn::user("Economics"),
            ],
            512,
        );
        let payload = build_payload("claude-3-haiku", &request);
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(payload["system"], "Interview me.");
    }

    #[test]
    fn test_parse_delta() {
        let text = json!({"type": "content_block_delta", "index": 0,
            "delta": {"type": "text_delta", "text": "x7"}});
        assert_eq!(parse_delta(&text).unwrap(), Delta::Text("x7".into()));

        let ping = json!({"type": "ping"});
        assert_eq!(parse_delta(&ping).unwrap(), Delta::Skip);

        let stop = json!({"type": "message_stop"});
        assert_eq!(parse_delta(&stop).unwrap(), Delta::Stop);

        let error = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        assert!(parse_delta(&error).is_err());
    }
}
