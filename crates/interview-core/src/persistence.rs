use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::model::{Role, SentinelRegistry, Session, SessionTiming, Transcript};
use crate::storage::{DurableStore, SaveSlot};

const TURN_SEPARATOR: &str = "\n---\n";

/// Cleaned, human-readable transcript handed to downstream storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedTranscript(String);

impl RenderedTranscript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for RenderedTranscript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render `"<Role>: <content>"` lines joined by `---`, skipping the System
/// turn and any turn that is only a sentinel code or its display message.
///
/// Pure function of its inputs, so re-rendering an unchanged transcript is
/// byte-identical.
pub fn render(transcript: &Transcript, registry: &SentinelRegistry) -> RenderedTranscript {
    let lines: Vec<String> = transcript
        .turns()
        .iter()
        .filter(|turn| turn.role != Role::System)
        .filter(|turn| !registry.is_sentinel_text(&turn.content))
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect();
    RenderedTranscript(lines.join(TURN_SEPARATOR))
}

/// Final and backup transcript writes for sessions.
pub struct TranscriptPersistence {
    store: Arc<dyn DurableStore>,
    registry: SentinelRegistry,
    clock: Arc<dyn Clock>,
}

impl TranscriptPersistence {
    pub fn new(
        store: Arc<dyn DurableStore>,
        registry: SentinelRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    pub fn registry(&self) -> &SentinelRegistry {
        &self.registry
    }

    pub fn finalize(&self, transcript: &Transcript) -> RenderedTranscript {
        render(transcript, &self.registry)
    }

    /// Write the live transcript (raw codes included) and timing to the final
    /// slot, returning the rendering. Transcript write failures propagate;
    /// timing failures are only logged.
    pub fn save_final(&self, session: &Session) -> Result<RenderedTranscript, CoreError> {
        if session.transcript.is_empty() {
            tracing::warn!(
                "No turns recorded for {}; final transcript not written",
                session.id
            );
        } else {
            self.store
                .write_transcript(&session.id, &SaveSlot::Final, &session.transcript)?;
            tracing::info!(
                "Final transcript for {} saved ({} turns)",
                session.id,
                session.transcript.len()
            );
        }
        self.write_timing(session, &SaveSlot::Final);
        Ok(self.finalize(&session.transcript))
    }

    /// Best-effort snapshot keyed by `tag`. Never fails the caller; returns
    /// whether the transcript snapshot was written.
    pub fn backup(&self, session: &Session, tag: &str) -> bool {
        let Some(stamp) = session.start_stamp() else {
            tracing::debug!("Skipping '{tag}' backup for {}: no start time", session.id);
            return false;
        };
        let slot = SaveSlot::backup(tag, stamp);
        match self
            .store
            .write_transcript(&session.id, &slot, &session.transcript)
        {
            Ok(()) => {
                self.write_timing(session, &slot);
                tracing::debug!("Backup '{tag}' written for {}", session.id);
                true
            }
            Err(e) => {
                tracing::warn!("Backup '{tag}' failed for {}: {e}", session.id);
                false
            }
        }
    }

    fn write_timing(&self, session: &Session, slot: &SaveSlot) {
        let timing = SessionTiming {
            session_id: session.id.clone(),
            start: session.started_at,
            end: self.clock.now(),
        };
        if let Err(e) = self.store.write_timing(slot, &timing) {
            tracing::warn!("Timing write failed for {}: {e}", session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::sentinel::INTERVIEW_END_MESSAGE;
    use crate::model::{SessionId, Turn};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn transcript() -> Transcript {
        Transcript::from_turns(vec![
            Turn::system("You are an interviewer."),
            Turn::assistant("What field are you aiming for?"),
            Turn::user("I want to work in finance"),
            Turn::assistant("Tell me more"),
            Turn::user("That's all"),
            Turn::assistant("x7y8"),
        ])
        .unwrap()
    }

    fn persistence(store: Arc<MemoryStore>) -> TranscriptPersistence {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap());
        TranscriptPersistence::new(store, SentinelRegistry::default(), Arc::new(clock))
    }

    #[test]
    fn test_render_excludes_system_and_sentinels() {
        let rendered = render(&transcript(), &SentinelRegistry::default());
        assert_eq!(
            rendered.as_str(),
            "Assistant: What field are you aiming for?\n---\n\
             User: I want to work in finance\n---\n\
             Assistant: Tell me more\n---\n\
             User: That's all"
        );
    }

    #[test]
    fn test_render_excludes_display_messages() {
        let mut t = transcript();
        t.push(Turn::assistant(INTERVIEW_END_MESSAGE)).unwrap();
        t.push(Turn::assistant("  5j3k ")).unwrap();
        let rendered = render(&t, &SentinelRegistry::default());
        assert!(!rendered.as_str().contains("Thank you very much"));
        assert!(!rendered.as_str().contains("5j3k"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let registry = SentinelRegistry::default();
        let t = transcript();
        assert_eq!(render(&t, &registry), render(&t, &registry));
        assert!(render(&Transcript::new(), &registry).is_empty());
    }

    #[test]
    fn test_save_final_keeps_raw_code_in_live_transcript() {
        let store = Arc::new(MemoryStore::new());
        let p = persistence(store.clone());
        let mut session = Session::new(SessionId::parse("user_f").unwrap(), false);
        session.transcript = transcript();

        let rendered = p.save_final(&session).unwrap();
        assert!(!rendered.as_str().contains("x7y8"));

        let stored = store.transcript(&session.id, &SaveSlot::Final).unwrap();
        assert_eq!(stored.last().unwrap().content, "x7y8");
        assert!(store.timing(&session.id, &SaveSlot::Final).is_some());
    }

    #[test]
    fn test_save_final_propagates_write_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_final_transcripts(true);
        let p = persistence(store);
        let mut session = Session::new(SessionId::parse("user_g").unwrap(), false);
        session.transcript = transcript();
        assert!(p.save_final(&session).is_err());
    }

    #[test]
    fn test_backup_requires_start_and_swallows_errors() {
        let store = Arc::new(MemoryStore::new());
        let p = persistence(store.clone());
        let mut session = Session::new(SessionId::parse("user_h").unwrap(), false);
        session.transcript = transcript();

        assert!(!p.backup(&session, "started"));
        assert!(store.backup_tags(&session.id).is_empty());

        session.started_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        assert!(p.backup(&session, "started"));
        assert_eq!(store.backup_tags(&session.id), vec!["started"]);

        store.fail_backups(true);
        assert!(!p.backup(&session, "inprogress"));
        assert_eq!(store.backup_tags(&session.id), vec!["started"]);
    }
}
