use std::sync::Arc;

use interview_backend::{GenerationBackend, GenerationRequest};
use interview_capture::{capture_stream, CapturedReply, SentinelDetector};
use interview_core::clock::Clock;
use interview_core::config::InterviewConfig;
use interview_core::gate::SurveyGate;
use interview_core::model::{
    initial_stage, FinalRecord, SentinelRegistry, Session, SessionId, Stage, SurveyResponses,
    Transcript, Turn,
};
use interview_core::persistence::TranscriptPersistence;
use interview_core::storage::DurableStore;

use crate::directive::{Directive, Event};
use crate::error::EngineError;
use crate::settings::EngineSettings;

const STARTED_BACKUP: &str = "started";
const IN_PROGRESS_BACKUP: &str = "inprogress";

/// Drives one session at a time through Welcome, Interview, Survey and
/// Completed. Shared across sessions; all per-session state lives in the
/// `Session` passed to each handler.
pub struct InterviewStateMachine {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn DurableStore>,
    persistence: TranscriptPersistence,
    gate: SurveyGate,
    detector: SentinelDetector,
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
}

impl InterviewStateMachine {
    pub fn new(
        config: &InterviewConfig,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let registry = config.sentinel_registry()?;
        Ok(Self::with_parts(
            EngineSettings::from_config(config),
            registry,
            backend,
            store,
            clock,
        ))
    }

    pub fn with_parts(
        settings: EngineSettings,
        registry: SentinelRegistry,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            persistence: TranscriptPersistence::new(
                store.clone(),
                registry.clone(),
                clock.clone(),
            ),
            gate: SurveyGate::new(store.clone(), settings.test_identity.clone()),
            detector: SentinelDetector::new(registry),
            backend,
            store,
            settings,
            clock,
        }
    }

    pub fn registry(&self) -> &SentinelRegistry {
        self.detector.registry()
    }

    pub fn gate(&self) -> &SurveyGate {
        &self.gate
    }

    pub fn persistence(&self) -> &TranscriptPersistence {
        &self.persistence
    }

    /// Resume a stored session or start a fresh one, then settle its stage.
    pub fn open_session(&self, id: SessionId, stored: Option<Session>) -> Session {
        let mut session = match stored {
            Some(session) if session.id == id => session,
            Some(other) => {
                tracing::warn!(
                    "Stored session {} does not match {id}, starting fresh",
                    other.id
                );
                Session::new(id.clone(), self.gate.is_test_identity(&id))
            }
            None => Session::new(id.clone(), self.gate.is_test_identity(&id)),
        };
        session.is_test_identity = self.gate.is_test_identity(&session.id);
        self.refresh_stage(&mut session);
        session
    }

    /// Pick up a final transcript written by an earlier run so the survey
    /// record is not submitted with an empty interview.
    fn recover_final_transcript(&self, session: &mut Session) {
        match self.store.read_final_transcript(&session.id) {
            Ok(Some(transcript)) => {
                tracing::debug!("Recovered final transcript for {}", session.id);
                session.transcript = transcript;
                session.final_saved = true;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Final transcript for {} unreadable: {e}", session.id),
        }
    }

    /// Recompute the stage from the oracles. Never moves backward, except
    /// that an external completion marker always forces `Completed`.
    pub fn refresh_stage(&self, session: &mut Session) -> Stage {
        if self.gate.is_survey_completed(&session.id) {
            if session.stage != Stage::Completed {
                tracing::info!("Session {} already submitted a survey", session.id);
            }
            session.force_completed();
            return session.stage;
        }
        let computed = initial_stage(
            session.survey_completed,
            session.welcome_acknowledged,
            session.interview_completed || self.gate.is_interview_finalized(&session.id),
        );
        if computed == Stage::Survey {
            session.interview_completed = true;
        }
        if session.advance_to(computed) && computed != Stage::Welcome {
            tracing::debug!("Session {} at stage {computed}", session.id);
        }
        if session.stage == Stage::Survey && session.transcript.is_empty() {
            self.recover_final_transcript(session);
        }
        session.stage
    }

    pub async fn handle<F>(
        &self,
        session: &mut Session,
        event: Event,
        on_text: F,
    ) -> Result<Directive, EngineError>
    where
        F: FnMut(&str),
    {
        match event {
            Event::Refresh => Ok(Directive::for_stage(self.refresh_stage(session))),
            Event::AcknowledgeWelcome { consent } => self.acknowledge_welcome(session, consent),
            Event::Begin => self.begin(session, on_text).await,
            Event::Respond(text) => self.submit_response(session, &text, on_text).await,
            Event::QuitEarly => self.quit_early(session),
            Event::SubmitSurvey(responses) => self.submit_survey(session, responses),
            Event::Retake => self.retake(session),
        }
    }

    pub fn acknowledge_welcome(
        &self,
        session: &mut Session,
        consent: bool,
    ) -> Result<Directive, EngineError> {
        self.refresh_stage(session);
        expect_stage(session, Stage::Welcome)?;
        session.welcome_acknowledged = true;
        session.consent_given = consent;
        let stage = self.refresh_stage(session);
        if stage == Stage::Interview && session.started_at.is_none() {
            session.started_at = Some(self.clock.now());
        }
        tracing::info!("Session {} acknowledged welcome (consent: {consent})", session.id);
        Ok(Directive::for_stage(stage))
    }

    /// Stream the interviewer's first message into an empty transcript.
    /// A no-op once the conversation has started.
    pub async fn begin<F>(
        &self,
        session: &mut Session,
        on_text: F,
    ) -> Result<Directive, EngineError>
    where
        F: FnMut(&str),
    {
        expect_stage(session, Stage::Interview)?;
        if !session.transcript.is_empty() {
            return Ok(Directive::AwaitResponse);
        }
        self.ensure_started(session);

        let mut candidate = Transcript::new();
        candidate.push(Turn::system(self.settings.system_prompt.clone()))?;
        let reply = self.generate(&candidate, on_text).await?;
        Ok(self.apply_reply(session, candidate, reply, STARTED_BACKUP))
    }

    /// Append the respondent's turn and stream the interviewer's reply.
    ///
    /// On any backend failure the session is left exactly as it was, so the
    /// caller can resubmit the same text.
    pub async fn submit_response<F>(
        &self,
        session: &mut Session,
        text: &str,
        on_text: F,
    ) -> Result<Directive, EngineError>
    where
        F: FnMut(&str),
    {
        expect_stage(session, Stage::Interview)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        self.ensure_started(session);

        let mut candidate = session.transcript.clone();
        if candidate.is_empty() {
            candidate.push(Turn::system(self.settings.system_prompt.clone()))?;
        }
        candidate.push(Turn::user(text))?;
        let reply = self.generate(&candidate, on_text).await?;
        Ok(self.apply_reply(session, candidate, reply, IN_PROGRESS_BACKUP))
    }

    pub fn quit_early(&self, session: &mut Session) -> Result<Directive, EngineError> {
        expect_stage(session, Stage::Interview)?;
        self.ensure_started(session);
        if session.transcript.is_empty() {
            session
                .transcript
                .push(Turn::system(self.settings.system_prompt.clone()))?;
        }
        session
            .transcript
            .push(Turn::assistant(self.settings.quit_message.clone()))?;
        tracing::info!("Session {} ended the interview early", session.id);
        self.close_interview(session);
        Ok(Directive::EndedEarly {
            message: self.settings.quit_message.clone(),
        })
    }

    /// Write the final record and mark the session complete.
    ///
    /// Any failure to persist the transcript or the record leaves the stage
    /// at `Survey` so the respondent can submit again.
    pub fn submit_survey(
        &self,
        session: &mut Session,
        responses: SurveyResponses,
    ) -> Result<Directive, EngineError> {
        if self.refresh_stage(session) == Stage::Completed {
            return Ok(Directive::Completed);
        }
        expect_stage(session, Stage::Survey)?;

        if !session.final_saved {
            tracing::info!("Retrying final transcript save for {}", session.id);
            self.persistence
                .save_final(session)
                .map_err(EngineError::Persistence)?;
            session.final_saved = true;
        }

        let now = self.clock.now();
        let record = FinalRecord {
            session_id: session.id.clone(),
            submitted_at: now,
            consent_given: session.consent_given,
            responses,
            transcript: self.persistence.finalize(&session.transcript).into_string(),
        };
        self.store.write_final_record(&record).map_err(|e| {
            tracing::error!("Final record for {} not saved: {e}", session.id);
            EngineError::Persistence(e)
        })?;

        if let Err(e) = self.store.write_survey_copy(&record) {
            tracing::warn!("Local survey copy for {} failed: {e}", session.id);
        }
        if session.is_test_identity {
            tracing::debug!("Test identity {}: completion flag not set", session.id);
        } else if let Err(e) = self.store.set_completion_flag(&session.id, now) {
            tracing::warn!("Completion flag for {} not set: {e}", session.id);
        }

        session.survey_completed = true;
        session.advance_to(Stage::Completed);
        tracing::info!("Session {} completed", session.id);
        Ok(Directive::Completed)
    }

    pub fn retake(&self, session: &mut Session) -> Result<Directive, EngineError> {
        if !self.gate.is_test_identity(&session.id) {
            return Err(EngineError::RetakeNotAllowed(session.id.to_string()));
        }
        session.reset();
        session.is_test_identity = true;
        tracing::info!("Test identity {} reset for a retake", session.id);
        Ok(Directive::ShowWelcome)
    }

    fn ensure_started(&self, session: &mut Session) {
        if session.started_at.is_none() {
            session.started_at = Some(self.clock.now());
        }
    }

    async fn generate<F>(
        &self,
        history: &Transcript,
        on_text: F,
    ) -> Result<CapturedReply, EngineError>
    where
        F: FnMut(&str),
    {
        let request = GenerationRequest::new(history.turns().to_vec(), self.settings.max_tokens)
            .system_prompt(self.settings.system_prompt.clone())
            .temperature(self.settings.temperature)
            .opening_prompt(self.settings.opening_prompt.clone());

        let stream = self.backend.stream(&request).await.map_err(|e| {
            tracing::warn!("{} backend failed to start: {e}", self.backend.name());
            EngineError::BackendUnavailable(e.to_string())
        })?;
        let reply = capture_stream(stream, &self.detector, on_text).await?;
        if reply.content.is_empty() {
            return Err(EngineError::BackendUnavailable(
                "backend returned an empty reply".into(),
            ));
        }
        Ok(reply)
    }

    /// Commit a completed reply. The transcript is only replaced here, after
    /// the whole reply arrived.
    fn apply_reply(
        &self,
        session: &mut Session,
        mut candidate: Transcript,
        reply: CapturedReply,
        backup_tag: &str,
    ) -> Directive {
        // Only System turns can be rejected by push.
        if let Err(e) = candidate.push(Turn::assistant(reply.content.clone())) {
            tracing::error!("Could not append reply for {}: {e}", session.id);
        }
        session.transcript = candidate;

        match reply.sentinel {
            Some(code) => {
                tracing::info!("Session {} closed by code '{}'", session.id, code.code);
                session.closing_code = Some(code.code.clone());
                self.close_interview(session);
                Directive::InterviewClosed {
                    code: code.code,
                    message: code.message,
                }
            }
            None => {
                self.persistence.backup(session, backup_tag);
                Directive::Reply {
                    content: reply.content,
                }
            }
        }
    }

    /// Final save, then Survey. A failed save is retried at survey
    /// submission and does not hold the respondent in the interview.
    fn close_interview(&self, session: &mut Session) {
        session.interview_completed = true;
        match self.persistence.save_final(session) {
            Ok(_) => session.final_saved = true,
            Err(e) => {
                tracing::error!("Final transcript save failed for {}: {e}", session.id);
                session.final_saved = false;
            }
        }
        session.advance_to(Stage::Survey);
    }
}

fn expect_stage(session: &Session, expected: Stage) -> Result<(), EngineError> {
    if session.stage == expected {
        Ok(())
    } else {
        Err(EngineError::WrongStage {
            expected,
            actual: session.stage,
        })
    }
}
