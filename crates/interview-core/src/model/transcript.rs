use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Speaker of a turn. There is no "enter" role, since no step of the
/// conversation ever produces one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Assistant,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
        }
    }

    /// Capitalized label used in rendered transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::Assistant => "Assistant",
            Role::User => "User",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Ordered, append-only turn history owned by a single session.
///
/// Serialized as a plain JSON array of `{"role", "content"}` objects. A
/// System turn, when present, is always the first turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from existing turns, checking the System-first rule.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self, CoreError> {
        let transcript = Self { turns };
        transcript.validate()?;
        Ok(transcript)
    }

    /// Append a turn. A System turn is only accepted as the first turn.
    pub fn push(&mut self, turn: Turn) -> Result<(), CoreError> {
        if turn.role == Role::System && !self.turns.is_empty() {
            return Err(CoreError::InvalidTranscript(format!(
                "system turn must be first, transcript already has {} turn(s)",
                self.turns.len()
            )));
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn has_system_turn(&self) -> bool {
        self.turns.first().is_some_and(|t| t.role == Role::System)
    }

    pub fn has_user_turn(&self) -> bool {
        self.turns.iter().any(|t| t.role == Role::User)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(pos) = self
            .turns
            .iter()
            .skip(1)
            .position(|t| t.role == Role::System)
        {
            return Err(CoreError::InvalidTranscript(format!(
                "system turn at position {} (only allowed first)",
                pos + 1
            )));
        }
        Ok(())
    }

    /// Serialize as an indented JSON array.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, CoreError> {
        let turns: Vec<Turn> = serde_json::from_slice(data)?;
        Self::from_turns(turns)
    }
}
