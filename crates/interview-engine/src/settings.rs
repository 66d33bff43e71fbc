use interview_core::config::InterviewConfig;

/// The slice of configuration the state machine reads on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub system_prompt: String,
    pub quit_message: String,
    pub opening_prompt: String,
    pub test_identity: String,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
}

impl EngineSettings {
    pub fn from_config(config: &InterviewConfig) -> Self {
        Self {
            system_prompt: config.interview.system_prompt.clone(),
            quit_message: config.interview.quit_message.clone(),
            opening_prompt: config.interview.opening_prompt.clone(),
            test_identity: config.interview.test_identity.clone(),
            temperature: config.backend.temperature,
            max_tokens: config.backend.max_output_tokens,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&InterviewConfig::default())
    }
}
