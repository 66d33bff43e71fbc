use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use interview_core::model::Role;

use crate::error::BackendError;
use crate::http::{check_status, join_url, sse_fragments, Delta};
use crate::request::{GenerationRequest, HttpBackendConfig};
use crate::{FragmentStream, GenerationBackend};

/// OpenAI-compatible `chat/completions` streaming backend.
#[derive(Debug)]
pub struct OpenAiBackend {
    http: Client,
    config: HttpBackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        join_url(&self.config.base_url, "/chat/completions")
    }
}

/// Request body. The System turn travels in-band as the first message.
pub fn build_payload(model: &str, request: &GenerationRequest) -> Value {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    let has_system_turn = request
        .turns
        .first()
        .is_some_and(|t| t.role == Role::System);
    if !has_system_turn {
        if let Some(prompt) = request.system_prompt.as_deref() {
            messages.push(json!({"role": "system", "content": prompt}));
        }
    }
    messages.extend(
        request
            .turns
            .iter()
            .map(|t| json!({"role": t.role.as_str(), "content": t.content})),
    );

    let mut payload = json!({
        "model": model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "stream": true,
    });
    if let Some(temperature) = request.temperature {
        payload["temperature"] = json!(temperature);
    }
    payload
}

pub(crate) fn parse_delta(value: &Value) -> Result<Delta, BackendError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(BackendError::Stream(message.to_string()));
    }
    let Some(choice) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    else {
        return Ok(Delta::Skip);
    };
    match choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        Some(text) => Ok(Delta::Text(text.to_string())),
        None => Ok(Delta::Skip),
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
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
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(sse_fragments(response, parse_delta))
    }
}
