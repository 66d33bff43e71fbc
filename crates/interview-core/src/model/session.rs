use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::Stage;
use super::transcript::Transcript;
use crate::error::CoreError;

/// Opaque, file-name-safe session identity. Generated once per respondent and
/// stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh `user_<uuid>` identity.
    pub fn generate() -> Self {
        Self(format!("user_{}", Uuid::new_v4()))
    }

    /// Parse and validate an ID string. Only ASCII alphanumerics, `-` and `_`
    /// are allowed since the ID becomes part of file names.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CoreError::InvalidId("ID must not be empty".into()));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(CoreError::InvalidId(format!(
                "'{s}' contains unsupported character '{bad}'"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one respondent's run through the study owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub is_test_identity: bool,
    pub stage: Stage,
    #[serde(default)]
    pub transcript: Transcript,
    #[serde(default)]
    pub welcome_acknowledged: bool,
    #[serde(default)]
    pub consent_given: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interview_completed: bool,
    #[serde(default)]
    pub survey_completed: bool,
    /// Whether the final transcript write has succeeded.
    #[serde(default)]
    pub final_saved: bool,
    /// Sentinel code that closed the interview, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_code: Option<String>,
}

impl Session {
    pub fn new(id: SessionId, is_test_identity: bool) -> Self {
        Self {
            id,
            is_test_identity,
            stage: Stage::Welcome,
            transcript: Transcript::new(),
            welcome_acknowledged: false,
            consent_given: false,
            started_at: None,
            interview_completed: false,
            survey_completed: false,
            final_saved: false,
            closing_code: None,
        }
    }

    /// Start time formatted for file names (`%Y%m%d_%H%M%S`).
    pub fn start_stamp(&self) -> Option<String> {
        self.started_at.map(|t| t.format("%Y%m%d_%H%M%S").to_string())
    }

    /// Move forward to `stage`. Returns false (and leaves the stage alone) if
    /// that would be a backward transition.
    pub fn advance_to(&mut self, stage: Stage) -> bool {
        if stage < self.stage {
            return false;
        }
        self.stage = stage;
        true
    }

    pub fn force_completed(&mut self) {
        self.stage = Stage::Completed;
        self.survey_completed = true;
        self.welcome_acknowledged = true;
    }

    /// Clear all progress so the session can run from `Welcome` again.
    pub fn reset(&mut self) {
        let id = self.id.clone();
        *self = Self::new(id, self.is_test_identity);
    }
}
