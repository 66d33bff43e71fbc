use std::fs;
use std::io::{Read as _, Write as _};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{FinalRecord, Session, SessionId, SessionTiming, Transcript};

use super::paths::StoreLayout;
use super::store::{DurableStore, SaveSlot};

/// File-backed store rooted at a data directory.
///
/// Every write takes an exclusive `fs2` lock on the target file before
/// truncating it, so a reader holding the shared lock never observes a
/// half-written or emptied transcript.
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: StoreLayout,
}

impl FileStore {
    /// Open a store at `root`, creating the directory layout.
    pub fn open(root: &Path) -> Result<Self, CoreError> {
        let layout = StoreLayout::new(root);
        layout.ensure_dirs()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Persist the whole session state so a later run can resume it.
    pub fn save_session(&self, session: &Session) -> Result<(), CoreError> {
        let json = serde_json::to_vec_pretty(session)?;
        write_locked(&self.layout.session_path(&session.id), &json)
    }

    /// Load a saved session, if one exists.
    pub fn load_session(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
        let path = self.layout.session_path(id);
        match read_locked(&path)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Read every final record appended so far, skipping unparseable lines.
    pub fn read_records(&self) -> Result<Vec<FinalRecord>, CoreError> {
        let Some(data) = read_locked(&self.layout.records_path())? else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8_lossy(&data);
        let mut records = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable final record: {e}"),
            }
        }
        Ok(records)
    }
}

impl DurableStore for FileStore {
    fn write_transcript(
        &self,
        id: &SessionId,
        slot: &SaveSlot,
        transcript: &Transcript,
    ) -> Result<(), CoreError> {
        let path = self.layout.transcript_path(id, slot);
        write_locked(&path, &transcript.to_json_pretty()?)?;
        tracing::debug!("Transcript saved to {}", path.display());
        Ok(())
    }

    fn write_timing(&self, slot: &SaveSlot, timing: &SessionTiming) -> Result<(), CoreError> {
        let path = self.layout.timing_path(&timing.session_id, slot);
        write_locked(&path, timing.to_csv().as_bytes())
    }

    fn read_final_transcript(&self, id: &SessionId) -> Result<Option<Transcript>, CoreError> {
        let path = self.layout.transcript_path(id, &SaveSlot::Final);
        match read_locked(&path)? {
            Some(data) => Ok(Some(Transcript::from_json(&data)?)),
            None => Ok(None),
        }
    }

    fn has_final_transcript(&self, id: &SessionId) -> bool {
        self.layout.transcript_path(id, &SaveSlot::Final).exists()
    }

    fn write_final_record(&self, record: &FinalRecord) -> Result<(), CoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        append_locked(&self.layout.records_path(), &line)?;
        tracing::info!("Final record for {} appended", record.session_id);
        Ok(())
    }

    fn write_survey_copy(&self, record: &FinalRecord) -> Result<(), CoreError> {
        let json = serde_json::to_vec_pretty(record)?;
        write_locked(&self.layout.survey_copy_path(&record.session_id), &json)
    }

    fn read_completion_flag(&self, id: &SessionId) -> bool {
        self.layout.completion_flag_path(id).exists()
    }

    fn set_completion_flag(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), CoreError> {
        let content = format!("Submitted at {}", at.format("%Y-%m-%d %H:%M:%S"));
        write_locked(&self.layout.completion_flag_path(id), content.as_bytes())
    }
}

/// Replace a file's contents under an exclusive lock.
fn write_locked(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::io_at(parent, e))?;
    }
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| CoreError::io_at(path, e))?;
    fs2::FileExt::lock_exclusive(&file).map_err(|e| CoreError::io_at(path, e))?;
    // Truncate only while holding the lock.
    let written = file
        .set_len(0)
        .and_then(|_| (&file).write_all(bytes))
        .and_then(|_| (&file).flush());
    fs2::FileExt::unlock(&file).map_err(|e| CoreError::io_at(path, e))?;
    written.map_err(|e| CoreError::io_at(path, e))
}

fn append_locked(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::io_at(parent, e))?;
    }
    let file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| CoreError::io_at(path, e))?;
    fs2::FileExt::lock_exclusive(&file).map_err(|e| CoreError::io_at(path, e))?;
    let written = (&file).write_all(bytes);
    fs2::FileExt::unlock(&file).map_err(|e| CoreError::io_at(path, e))?;
    written.map_err(|e| CoreError::io_at(path, e))
}

/// Read a file under a shared lock. `None` if it does not exist.
fn read_locked(path: &Path) -> Result<Option<Vec<u8>>, CoreError> {
    let file = match fs::OpenOptions::new().read(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::io_at(path, e)),
    };
    fs2::FileExt::lock_shared(&file).map_err(|e| CoreError::io_at(path, e))?;
    let mut data = Vec::new();
    let read = (&file).read_to_end(&mut data);
    fs2::FileExt::unlock(&file).map_err(|e| CoreError::io_at(path, e))?;
    read.map_err(|e| CoreError::io_at(path, e))?;
    Ok(Some(data))
}
