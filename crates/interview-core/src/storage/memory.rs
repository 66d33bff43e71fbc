use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{FinalRecord, SessionId, SessionTiming, Transcript};

use super::store::{DurableStore, SaveSlot};

#[derive(Debug, Default)]
struct Inner {
    transcripts: HashMap<(SessionId, SaveSlot), Transcript>,
    timings: HashMap<(SessionId, SaveSlot), SessionTiming>,
    records: Vec<FinalRecord>,
    copies: HashMap<SessionId, FinalRecord>,
    flags: HashSet<SessionId>,
    fail_final_transcripts: bool,
    fail_backups: bool,
    fail_records: bool,
}

/// In-process store. Writes can be made to fail on demand, which makes it
/// the store of choice for exercising persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_final_transcripts(&self, fail: bool) {
        self.lock().fail_final_transcripts = fail;
    }

    pub fn fail_backups(&self, fail: bool) {
        self.lock().fail_backups = fail;
    }

    pub fn fail_records(&self, fail: bool) {
        self.lock().fail_records = fail;
    }

    pub fn transcript(&self, id: &SessionId, slot: &SaveSlot) -> Option<Transcript> {
        self.lock()
            .transcripts
            .get(&(id.clone(), slot.clone()))
            .cloned()
    }

    /// Backup tags written for a session, sorted.
    pub fn backup_tags(&self, id: &SessionId) -> Vec<String> {
        let mut tags: Vec<String> = self
            .lock()
            .transcripts
            .keys()
            .filter(|(sid, _)| sid == id)
            .filter_map(|(_, slot)| match slot {
                SaveSlot::Backup { tag, .. } => Some(tag.clone()),
                SaveSlot::Final => None,
            })
            .collect();
        tags.sort();
        tags
    }

    pub fn timing(&self, id: &SessionId, slot: &SaveSlot) -> Option<SessionTiming> {
        self.lock().timings.get(&(id.clone(), slot.clone())).cloned()
    }

    pub fn records(&self) -> Vec<FinalRecord> {
        self.lock().records.clone()
    }

    pub fn survey_copy(&self, id: &SessionId) -> Option<FinalRecord> {
        self.lock().copies.get(id).cloned()
    }

    /// Plant a completion flag, as if a previous run had finished.
    pub fn mark_completed(&self, id: &SessionId) {
        self.lock().flags.insert(id.clone());
    }
}

impl DurableStore for MemoryStore {
    fn write_transcript(
        &self,
        id: &SessionId,
        slot: &SaveSlot,
        transcript: &Transcript,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let failing = if slot.is_final() {
            inner.fail_final_transcripts
        } else {
            inner.fail_backups
        };
        if failing {
            return Err(CoreError::Rejected(format!("transcript write for {id}")));
        }
        inner
            .transcripts
            .insert((id.clone(), slot.clone()), transcript.clone());
        Ok(())
    }

    fn write_timing(&self, slot: &SaveSlot, timing: &SessionTiming) -> Result<(), CoreError> {
        self.lock()
            .timings
            .insert((timing.session_id.clone(), slot.clone()), timing.clone());
        Ok(())
    }

    fn read_final_transcript(&self, id: &SessionId) -> Result<Option<Transcript>, CoreError> {
        Ok(self.transcript(id, &SaveSlot::Final))
    }

    fn has_final_transcript(&self, id: &SessionId) -> bool {
        self.lock()
            .transcripts
            .contains_key(&(id.clone(), SaveSlot::Final))
    }

    fn write_final_record(&self, record: &FinalRecord) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.fail_records {
            return Err(CoreError::Rejected(format!(
                "final record for {}",
                record.session_id
            )));
        }
        inner.records.push(record.clone());
        Ok(())
    }

    fn write_survey_copy(&self, record: &FinalRecord) -> Result<(), CoreError> {
        self.lock()
            .copies
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    fn read_completion_flag(&self, id: &SessionId) -> bool {
        self.lock().flags.contains(id)
    }

    fn set_completion_flag(&self, id: &SessionId, _at: DateTime<Utc>) -> Result<(), CoreError> {
        self.lock().flags.insert(id.clone());
        Ok(())
    }
}
