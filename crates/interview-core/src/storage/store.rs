use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{FinalRecord, SessionId, SessionTiming, Transcript};

/// Where a transcript save lands: the single final slot, or a tagged backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SaveSlot {
    Final,
    Backup { tag: String, stamp: String },
}

impl SaveSlot {
    pub fn backup(tag: impl Into<String>, stamp: impl Into<String>) -> Self {
        SaveSlot::Backup {
            tag: tag.into(),
            stamp: stamp.into(),
        }
    }

    /// File name suffix appended to the session ID.
    pub fn suffix(&self) -> String {
        match self {
            SaveSlot::Final => String::new(),
            SaveSlot::Backup { tag, stamp } => format!("_backup_{tag}_{stamp}"),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SaveSlot::Final)
    }
}

/// Durable side of a session, keyed by session ID. Writes for different
/// sessions never touch the same keys.
pub trait DurableStore: Send + Sync {
    fn write_transcript(
        &self,
        id: &SessionId,
        slot: &SaveSlot,
        transcript: &Transcript,
    ) -> Result<(), CoreError>;

    fn write_timing(&self, slot: &SaveSlot, timing: &SessionTiming) -> Result<(), CoreError>;

    fn read_final_transcript(&self, id: &SessionId) -> Result<Option<Transcript>, CoreError>;

    fn has_final_transcript(&self, id: &SessionId) -> bool;

    /// Primary write of the completed survey plus rendered transcript.
    fn write_final_record(&self, record: &FinalRecord) -> Result<(), CoreError>;

    /// Secondary per-session copy of the final record.
    fn write_survey_copy(&self, record: &FinalRecord) -> Result<(), CoreError>;

    fn read_completion_flag(&self, id: &SessionId) -> bool;

    fn set_completion_flag(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), CoreError>;
}
