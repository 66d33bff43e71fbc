use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::model::SessionId;

use super::store::SaveSlot;

pub const TRANSCRIPTS_DIR: &str = "transcripts";
pub const TIMES_DIR: &str = "times";
pub const BACKUPS_DIR: &str = "backups";
pub const SURVEY_DIR: &str = "survey";
pub const SESSIONS_DIR: &str = "sessions";
pub const RECORDS_FILE: &str = "records.jsonl";

/// Directory layout of the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dirs(&self) -> [PathBuf; 5] {
        [
            self.root.join(TRANSCRIPTS_DIR),
            self.root.join(TIMES_DIR),
            self.root.join(BACKUPS_DIR),
            self.root.join(SURVEY_DIR),
            self.root.join(SESSIONS_DIR),
        ]
    }

    /// Create every data directory that does not exist yet.
    pub fn ensure_dirs(&self) -> Result<(), CoreError> {
        for dir in self.dirs() {
            fs::create_dir_all(&dir).map_err(|e| CoreError::io_at(&dir, e))?;
        }
        Ok(())
    }

    fn slot_dir(&self, slot: &SaveSlot, final_dir: &str) -> PathBuf {
        match slot {
            SaveSlot::Final => self.root.join(final_dir),
            SaveSlot::Backup { .. } => self.root.join(BACKUPS_DIR),
        }
    }

    pub fn transcript_path(&self, id: &SessionId, slot: &SaveSlot) -> PathBuf {
        self.slot_dir(slot, TRANSCRIPTS_DIR)
            .join(format!("{id}{}_transcript.json", slot.suffix()))
    }

    pub fn timing_path(&self, id: &SessionId, slot: &SaveSlot) -> PathBuf {
        self.slot_dir(slot, TIMES_DIR)
            .join(format!("{id}{}_time.csv", slot.suffix()))
    }

    pub fn records_path(&self) -> PathBuf {
        self.root.join(SURVEY_DIR).join(RECORDS_FILE)
    }

    pub fn survey_copy_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(SURVEY_DIR).join(format!("{id}_survey.json"))
    }

    pub fn completion_flag_path(&self, id: &SessionId) -> PathBuf {
        self.root
            .join(SURVEY_DIR)
            .join(format!("{id}_survey_submitted.flag"))
    }

    pub fn session_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(SESSIONS_DIR).join(format!("{id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = StoreLayout::new("/data");
        let id = SessionId::parse("user_x").unwrap();
        assert_eq!(
            layout.transcript_path(&id, &SaveSlot::Final),
            PathBuf::from("/data/transcripts/user_x_transcript.json")
        );
        assert_eq!(
            layout.transcript_path(&id, &SaveSlot::backup("started", "20250101_000000")),
            PathBuf::from("/data/backups/user_x_backup_started_20250101_000000_transcript.json")
        );
        assert_eq!(
            layout.timing_path(&id, &SaveSlot::Final),
            PathBuf::from("/data/times/user_x_time.csv")
        );
        assert_eq!(
            layout.completion_flag_path(&id),
            PathBuf::from("/data/survey/user_x_survey_submitted.flag")
        );
        assert_eq!(
            layout.session_path(&id),
            PathBuf::from("/data/sessions/user_x.json")
        );
    }
}
