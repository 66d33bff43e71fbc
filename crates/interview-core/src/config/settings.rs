use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::sentinel::{default_sentinels, SentinelCode, SentinelRegistry};

pub const DEFAULT_CONFIG_FILE: &str = "interview.toml";
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-05-13";
pub const DEFAULT_TEST_IDENTITY: &str = "testaccount";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are conducting qualitative research interviews for a PhD project. Your goal is to understand \
how university students and recent graduates perceive valuable job skills, how thoughts about AI \
influence these perceptions, and how this relates to their educational choices. Ask one question \
at a time.

Start with: \"Hello! Thanks for speaking with me today about your perspective on skills and career \
preparation. To begin, could you briefly share what career field you are currently in or aiming \
for after your studies?\" Then explore the skills they consider crucial and why, how AI is \
changing the importance of those skills, and how this shaped their course choices. Finish by \
asking how they use AI tools themselves.

Adopt a professional, empathetic and curious persona. Questions should be open-ended and neutral, \
especially regarding AI's impact. Elicit specific examples and probe the reasoning behind views \
without judgment. Do not number your questions.

Codes: there are specific codes that must be used exclusively in designated situations. Reply \
with the exact code only, with no additional text.

Problematic content: if the respondent writes legally or ethically problematic content, reply \
with exactly the code '5j3k'.

End of the interview: when the interview is complete, or if the respondent indicates they wish \
to stop early, reply with exactly the code 'x7y8'.";

pub const DEFAULT_QUIT_MESSAGE: &str =
    "You have chosen to end the interview early. Proceeding to the final questions.";
pub const DEFAULT_OPENING_PROMPT: &str = "Please begin the interview.";

/// Top-level configuration, read from `interview.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    pub backend: BackendSettings,
    pub interview: InterviewSettings,
    pub sentinels: Vec<SentinelCode>,
    pub storage: StorageSettings,
    pub survey: SurveySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_output_tokens: 2048,
            base_url: None,
            api_key_env: None,
        }
    }
}

impl BackendSettings {
    /// The configured key variable, or the provider default inferred from the
    /// model name.
    pub fn api_key_var(&self) -> &str {
        if let Some(var) = &self.api_key_env {
            return var;
        }
        if self.model.to_lowercase().contains("claude") {
            "API_KEY_ANTHROPIC"
        } else {
            "API_KEY_OPENAI"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewSettings {
    pub system_prompt: String,
    pub quit_message: String,
    /// Stand-in user message for backends that cannot start from an empty
    /// conversation.
    pub opening_prompt: String,
    pub test_identity: String,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            quit_message: DEFAULT_QUIT_MESSAGE.to_string(),
            opening_prompt: DEFAULT_OPENING_PROMPT.to_string(),
            test_identity: DEFAULT_TEST_IDENTITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub prompt: String,
    /// Allowed answers. Empty means free text.
    #[serde(default)]
    pub options: Vec<String>,
}

impl SurveyQuestion {
    fn choice(id: &str, prompt: &str, options: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            options,
        }
    }

    pub fn is_free_text(&self) -> bool {
        self.options.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveySettings {
    pub questions: Vec<SurveyQuestion>,
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            questions: default_questions(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_questions() -> Vec<SurveyQuestion> {
    let mut ages = vec!["Under 18".to_string()];
    ages.extend((18..=35).map(|age| age.to_string()));
    ages.push("Older than 35".to_string());

    let mut gpas = vec!["Below 5.0".to_string()];
    gpas.extend((50..=100).map(|tenths| format!("{:.1}", tenths as f64 / 10.0)));
    gpas.push("Prefer not to say / Not applicable".to_string());

    vec![
        SurveyQuestion::choice("age", "Age?", ages),
        SurveyQuestion::choice(
            "gender",
            "Gender?",
            strings(&["Male", "Female", "Non-binary", "Prefer not to say"]),
        ),
        SurveyQuestion::choice(
            "major",
            "Major/Field?",
            strings(&[
                "Computer Science",
                "Engineering (Other)",
                "Business",
                "Humanities",
                "Social Sciences",
                "Natural Sciences",
                "Arts",
                "Health Sciences",
                "Other",
                "Not Applicable",
            ]),
        ),
        SurveyQuestion::choice(
            "year",
            "Year?",
            strings(&[
                "1st Year Undergraduate",
                "2nd Year Undergraduate",
                "3rd Year Undergraduate",
                "4th+ Year Undergraduate",
                "Graduate Student",
                "Postgraduate/Doctoral",
                "Not a Student",
            ]),
        ),
        SurveyQuestion::choice("gpa", "GPA?", gpas),
        SurveyQuestion::choice(
            "ai_frequency",
            "AI Use Frequency?",
            strings(&[
                "Frequently (Daily/Weekly)",
                "Occasionally (Monthly)",
                "Rarely (Few times a year)",
                "Never",
                "Unsure",
            ]),
        ),
        SurveyQuestion::choice("ai_model", "AI Model(s) Used?", Vec::new()),
    ]
}

impl InterviewConfig {
    /// Read config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut config: Self = match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(CoreError::io_at(path, e)),
        };
        if config.sentinels.is_empty() {
            config.sentinels = default_sentinels();
        }
        config.validate()?;
        Ok(config)
    }

    /// Write config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io_at(parent, e))?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| CoreError::io_at(path, e))?;
        Ok(())
    }

    /// Default config for `interview init`.
    pub fn default_init() -> Self {
        Self {
            sentinels: default_sentinels(),
            ..Self::default()
        }
    }

    pub fn write_default(path: &Path) -> Result<Self, CoreError> {
        let config = Self::default_init();
        config.save(path)?;
        Ok(config)
    }

    /// Build the sentinel registry, falling back to the defaults when none
    /// are configured.
    pub fn sentinel_registry(&self) -> Result<SentinelRegistry, CoreError> {
        if self.sentinels.is_empty() {
            return Ok(SentinelRegistry::default());
        }
        SentinelRegistry::new(self.sentinels.clone())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.backend.model.trim().is_empty() {
            return Err(CoreError::Config("backend.model must not be empty".into()));
        }
        if self.backend.max_output_tokens == 0 {
            return Err(CoreError::Config(
                "backend.max_output_tokens must be positive".into(),
            ));
        }
        if self.interview.test_identity.trim().is_empty() {
            return Err(CoreError::Config(
                "interview.test_identity must not be empty".into(),
            ));
        }
        self.sentinel_registry()?;
        Ok(())
    }
}
