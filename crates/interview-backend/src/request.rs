use interview_core::config::BackendSettings;
use interview_core::model::{Role, Turn};

use crate::anthropic::AnthropicBackend;
use crate::error::BackendError;
use crate::openai::OpenAiBackend;
use crate::GenerationBackend;

/// One generation call: the full turn history plus sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub turns: Vec<Turn>,
    /// Used by backends that take the system prompt out of band. Falls back
    /// to the leading System turn when unset.
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    /// Sent as the only user message when the history has no User turn and
    /// the backend cannot start from an assistant-first conversation.
    pub opening_prompt: String,
}

impl GenerationRequest {
    pub fn new(turns: Vec<Turn>, max_tokens: u32) -> Self {
        Self {
            turns,
            system_prompt: None,
            temperature: None,
            max_tokens,
            opening_prompt: String::new(),
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn opening_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.opening_prompt = prompt.into();
        self
    }

    /// The effective system prompt: explicit, else the leading System turn.
    pub fn effective_system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().or_else(|| {
            self.turns
                .first()
                .filter(|t| t.role == Role::System)
                .map(|t| t.content.as_str())
        })
    }

    pub fn has_user_turn(&self) -> bool {
        self.turns.iter().any(|t| t.role == Role::User)
    }
}

/// Which wire protocol a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Anthropic,
}

impl BackendKind {
    pub fn from_model(model: &str) -> Result<Self, BackendError> {
        let lower = model.to_lowercase();
        if lower.contains("gpt") {
            Ok(BackendKind::OpenAi)
        } else if lower.contains("claude") {
            Ok(BackendKind::Anthropic)
        } else {
            Err(BackendError::Config(format!(
                "cannot infer a backend for model '{model}' (expected a gpt or claude model)"
            )))
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "https://api.openai.com/v1",
            BackendKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Build the network backend for the configured model.
pub fn select_backend(
    settings: &BackendSettings,
    api_key: String,
) -> Result<Box<dyn GenerationBackend>, BackendError> {
    let kind = BackendKind::from_model(&settings.model)?;
    let config = HttpBackendConfig {
        base_url: settings
            .base_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string()),
        api_key,
        model: settings.model.clone(),
    };
    tracing::debug!("Using {kind:?} backend at {}", config.base_url);
    Ok(match kind {
        BackendKind::OpenAi => Box::new(OpenAiBackend::new(config)?),
        BackendKind::Anthropic => Box::new(AnthropicBackend::new(config)?),
    })
}
