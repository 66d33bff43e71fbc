use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use interview_backend::{HttpBackendConfig, OpenAiBackend, ScriptedBackend, ScriptedReply};
use interview_core::config::InterviewConfig;
use interview_core::model::sentinel::INTERVIEW_END_MESSAGE;
use interview_core::model::{Role, Session, SessionId, Stage, SurveyResponses};
use interview_core::storage::{DurableStore, MemoryStore, SaveSlot};
use interview_core::{Clock, FixedClock};
use interview_engine::{Directive, EngineError, Event, InterviewStateMachine};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    machine: InterviewStateMachine,
    backend: Arc<ScriptedBackend>,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
}

fn harness(replies: Vec<ScriptedReply>) -> Harness {
    let backend = Arc::new(ScriptedBackend::new(replies));
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
    ));
    let machine = InterviewStateMachine::new(
        &InterviewConfig::default(),
        backend.clone(),
        store.clone(),
        clock.clone(),
    )
    .unwrap();
    Harness {
        machine,
        backend,
        store,
        clock,
    }
}

fn id(s: &str) -> SessionId {
    SessionId::parse(s).unwrap()
}

fn responses() -> SurveyResponses {
    let mut r = SurveyResponses::new();
    r.insert("age", "22");
    r.insert("ai_model", "ChatGPT");
    r
}

/// A session that has acknowledged the welcome and is in the interview.
fn interviewing(h: &Harness, name: &str) -> Session {
    let mut session = h.machine.open_session(id(name), None);
    h.machine.acknowledge_welcome(&mut session, true).unwrap();
    session
}

#[tokio::test]
async fn welcome_acknowledgement_starts_the_clock() {
    let h = harness(vec![]);
    let mut session = h.machine.open_session(id("user_a"), None);
    assert_eq!(session.stage, Stage::Welcome);
    assert!(session.started_at.is_none());

    let directive = h
        .machine
        .handle(&mut session, Event::AcknowledgeWelcome { consent: true }, |_| {})
        .await
        .unwrap();
    assert_eq!(directive, Directive::AwaitResponse);
    assert_eq!(session.stage, Stage::Interview);
    assert_eq!(session.started_at, Some(h.clock.now()));
    assert!(session.consent_given);
}

#[tokio::test]
async fn opening_message_is_stored_after_system_turn() {
    let h = harness(vec![ScriptedReply::fragments(["Hello! ", "What do you study?"])]);
    let mut session = interviewing(&h, "user_b");

    let directive = h.machine.begin(&mut session, |_| {}).await.unwrap();
    assert_eq!(
        directive,
        Directive::Reply {
            content: "Hello! What do you study?".into()
        }
    );
    let turns = session.transcript.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(h.store.backup_tags(&session.id), vec!["started"]);

    let request = &h.backend.requests()[0];
    assert!(!request.has_user_turn());
    assert_eq!(request.opening_prompt, "Please begin the interview.");

    // Already started: no second opening message.
    assert_eq!(
        h.machine.begin(&mut session, |_| {}).await.unwrap(),
        Directive::AwaitResponse
    );
    assert_eq!(h.backend.requests().len(), 1);
}

#[tokio::test]
async fn closing_code_moves_to_survey_and_finalizes() {
    let h = harness(vec![
        ScriptedReply::fragments(["Tell", " me", " more"]),
        ScriptedReply::fragments(["x7y8"]),
    ]);
    let mut session = interviewing(&h, "user_c");

    let mut shown = Vec::new();
    let directive = h
        .machine
        .submit_response(&mut session, "I want to work in finance", |t| {
            shown.push(t.to_string())
        })
        .await
        .unwrap();
    assert_eq!(
        directive,
        Directive::Reply {
            content: "Tell me more".into()
        }
    );
    assert_eq!(shown.last().map(String::as_str), Some("Tell me more"));
    assert_eq!(session.stage, Stage::Interview);
    assert_eq!(h.store.backup_tags(&session.id), vec!["inprogress"]);

    let directive = h
        .machine
        .submit_response(&mut session, "That's all really", |_| {})
        .await
        .unwrap();
    assert_eq!(
        directive,
        Directive::InterviewClosed {
            code: "x7y8".into(),
            message: INTERVIEW_END_MESSAGE.into()
        }
    );
    assert_eq!(session.stage, Stage::Survey);
    assert!(session.interview_completed);
    assert!(session.final_saved);
    assert_eq!(session.closing_code.as_deref(), Some("x7y8"));

    // Live transcript keeps the raw code; the rendering drops it.
    let stored = h.store.transcript(&session.id, &SaveSlot::Final).unwrap();
    assert_eq!(stored.last().unwrap().content, "x7y8");
    let rendered = h.machine.persistence().finalize(&session.transcript);
    assert_eq!(
        rendered.as_str(),
        "User: I want to work in finance\n---\nAssistant: Tell me more\n---\nUser: That's all really"
    );
    assert_eq!(rendered, h.machine.persistence().finalize(&session.transcript));
}

#[tokio::test]
async fn sentinel_cancels_the_stream_early() {
    let h = harness(vec![ScriptedReply::fragments([
        "5j", "3k", " and", " more", " tokens",
    ])]);
    let mut session = interviewing(&h, "user_d");

    let directive = h
        .machine
        .submit_response(&mut session, "something inappropriate", |_| {})
        .await
        .unwrap();
    assert!(matches!(directive, Directive::InterviewClosed { ref code, .. } if code == "5j3k"));
    assert_eq!(h.backend.fragments_pulled(), 2);
}

#[tokio::test]
async fn quit_early_on_empty_transcript() {
    let h = harness(vec![]);
    let mut session = interviewing(&h, "user_e");

    let directive = h
        .machine
        .handle(&mut session, Event::QuitEarly, |_| {})
        .await
        .unwrap();
    let quit = InterviewConfig::default().interview.quit_message;
    assert_eq!(directive, Directive::EndedEarly { message: quit.clone() });
    assert_eq!(session.stage, Stage::Survey);

    let turns = session.transcript.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, quit);
    assert!(h.store.transcript(&session.id, &SaveSlot::Final).is_some());
}

#[tokio::test]
async fn backend_unavailable_leaves_session_untouched() {
    let h = harness(vec![
        ScriptedReply::fail("connection refused"),
        ScriptedReply::fragments(["Thanks, go on."]),
    ]);
    let mut session = interviewing(&h, "user_f");
    let before = session.clone();

    let err = h
        .machine
        .submit_response(&mut session, "My answer", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BackendUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(session, before);

    h.machine
        .submit_response(&mut session, "My answer", |_| {})
        .await
        .unwrap();
    let roles: Vec<_> = session.transcript.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn interrupted_reply_is_discarded() {
    let h = harness(vec![ScriptedReply::fail_after(
        ["I was about to ", "say"],
        "stream reset",
    )]);
    let mut session = interviewing(&h, "user_g");
    let before = session.clone();

    let err = h
        .machine
        .submit_response(&mut session, "Go ahead", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::BackendInterrupted { discarded: 18, .. }
    ));
    assert_eq!(session, before);
    assert!(h.store.backup_tags(&session.id).is_empty());
}

#[tokio::test]
async fn reply_cut_off_by_the_network_is_discarded() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Tell me\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" mo",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(HttpBackendConfig {
        base_url: server.uri(),
        api_key: "test-key".into(),
        model: "gpt-4o".into(),
    })
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let machine = InterviewStateMachine::new(
        &InterviewConfig::default(),
        Arc::new(backend),
        store.clone(),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
        )),
    )
    .unwrap();
    let mut session = machine.open_session(id("user_net"), None);
    machine.acknowledge_welcome(&mut session, true).unwrap();
    let before = session.clone();

    let err = machine
        .submit_response(&mut session, "I study economics", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::BackendInterrupted { discarded: 7, .. }
    ));
    assert_eq!(session, before);
    assert!(store.backup_tags(&session.id).is_empty());
}

#[tokio::test]
async fn backup_failure_does_not_block_the_interview() {
    let h = harness(vec![ScriptedReply::fragments(["Noted."])]);
    h.store.fail_backups(true);
    let mut session = interviewing(&h, "user_h");

    let directive = h
        .machine
        .submit_response(&mut session, "Hello", |_| {})
        .await
        .unwrap();
    assert_eq!(
        directive,
        Directive::Reply {
            content: "Noted.".into()
        }
    );
    assert_eq!(session.transcript.len(), 3);
}

#[tokio::test]
async fn failed_final_save_is_retried_at_survey_submission() {
    let h = harness(vec![ScriptedReply::fragments(["x7y8"])]);
    h.store.fail_final_transcripts(true);
    let mut session = interviewing(&h, "user_i");

    h.machine
        .submit_response(&mut session, "Done", |_| {})
        .await
        .unwrap();
    assert_eq!(session.stage, Stage::Survey);
    assert!(!session.final_saved);

    let err = h.machine.submit_survey(&mut session, responses()).unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(session.stage, Stage::Survey);
    assert!(h.store.records().is_empty());

    h.store.fail_final_transcripts(false);
    h.clock.advance(Duration::minutes(12));
    let directive = h.machine.submit_survey(&mut session, responses()).unwrap();
    assert_eq!(directive, Directive::Completed);
    assert_eq!(session.stage, Stage::Completed);
    assert!(h.store.transcript(&session.id, &SaveSlot::Final).is_some());

    let timing = h.store.timing(&session.id, &SaveSlot::Final).unwrap();
    assert_eq!(timing.duration_seconds(), 12 * 60);
}

#[tokio::test]
async fn record_failure_keeps_survey_stage() {
    let h = harness(vec![]);
    let mut session = interviewing(&h, "user_j");
    h.machine.quit_early(&mut session).unwrap();

    h.store.fail_records(true);
    assert!(h.machine.submit_survey(&mut session, responses()).is_err());
    assert_eq!(session.stage, Stage::Survey);
    assert!(!h.store.read_completion_flag(&session.id));
}

#[tokio::test]
async fn survey_submission_writes_record_copy_and_flag() {
    let h = harness(vec![
        ScriptedReply::fragments(["Which sector?"]),
        ScriptedReply::fragments(["x7y8"]),
    ]);
    let mut session = interviewing(&h, "user_k");
    h.machine.begin(&mut session, |_| {}).await.unwrap();
    h.machine
        .submit_response(&mut session, "Banking", |_| {})
        .await
        .unwrap();

    h.machine.submit_survey(&mut session, responses()).unwrap();
    let records = h.store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.session_id, session.id);
    assert!(record.consent_given);
    assert_eq!(record.responses.get("age"), Some("22"));
    assert_eq!(
        record.transcript,
        "Assistant: Which sector?\n---\nUser: Banking"
    );
    assert!(h.store.survey_copy(&session.id).is_some());
    assert!(h.machine.gate().is_survey_completed(&session.id));

    // Resubmitting is a no-op.
    assert_eq!(
        h.machine.submit_survey(&mut session, responses()).unwrap(),
        Directive::Completed
    );
    assert_eq!(h.store.records().len(), 1);
}

#[tokio::test]
async fn completion_marker_forces_completed() {
    let h = harness(vec![]);
    let sid = id("user_l");
    h.store.mark_completed(&sid);

    let mut stored = Session::new(sid.clone(), false);
    stored.welcome_acknowledged = true;
    stored.stage = Stage::Interview;
    let session = h.machine.open_session(sid, Some(stored));
    assert_eq!(session.stage, Stage::Completed);
    assert!(session.survey_completed);
}

#[tokio::test]
async fn finalized_interview_resumes_at_survey() {
    let h = harness(vec![]);
    let mut first = interviewing(&h, "user_m");
    h.machine.quit_early(&mut first).unwrap();

    // A new run without the session file: the final transcript is the oracle.
    let mut session = h.machine.open_session(id("user_m"), None);
    assert_eq!(session.stage, Stage::Welcome);
    h.machine.acknowledge_welcome(&mut session, true).unwrap();
    assert_eq!(session.stage, Stage::Survey);

    let resumed = h.machine.open_session(id("user_m"), Some(session));
    assert_eq!(resumed.stage, Stage::Survey);
    assert_eq!(resumed.transcript.len(), 2);
    assert!(resumed.final_saved);
}

#[tokio::test]
async fn test_identity_is_exempt_and_may_retake() {
    let h = harness(vec![]);
    let sid = id("testaccount");
    let mut session = interviewing(&h, "testaccount");
    assert!(session.is_test_identity);

    h.machine.quit_early(&mut session).unwrap();
    h.machine.submit_survey(&mut session, responses()).unwrap();
    assert_eq!(session.stage, Stage::Completed);
    assert!(!h.store.read_completion_flag(&sid));
    assert!(!h.machine.gate().is_survey_completed(&sid));

    // Even a planted marker does not lock the test identity out.
    h.store.mark_completed(&sid);
    let fresh = h.machine.open_session(sid.clone(), None);
    assert_eq!(fresh.stage, Stage::Welcome);

    let directive = h
        .machine
        .handle(&mut session, Event::Retake, |_| {})
        .await
        .unwrap();
    assert_eq!(directive, Directive::ShowWelcome);
    assert_eq!(session.stage, Stage::Welcome);
    assert!(session.transcript.is_empty());
}

#[tokio::test]
async fn regular_identity_cannot_retake() {
    let h = harness(vec![]);
    let mut session = interviewing(&h, "user_n");
    assert!(matches!(
        h.machine.retake(&mut session),
        Err(EngineError::RetakeNotAllowed(_))
    ));
}

#[tokio::test]
async fn actions_are_checked_against_the_stage() {
    let h = harness(vec![ScriptedReply::fragments(["unused"])]);
    let mut session = h.machine.open_session(id("user_o"), None);

    let err = h
        .machine
        .submit_response(&mut session, "too early", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::WrongStage {
            expected: Stage::Interview,
            actual: Stage::Welcome
        }
    ));
    assert!(h.machine.quit_early(&mut session).is_err());
    assert!(h.backend.requests().is_empty());

    h.machine.acknowledge_welcome(&mut session, false).unwrap();
    assert!(matches!(
        h.machine
            .submit_response(&mut session, "   ", |_| {})
            .await,
        Err(EngineError::EmptyInput)
    ));
    assert!(h.machine.acknowledge_welcome(&mut session, true).is_err());
}

#[tokio::test]
async fn file_store_session_resumes_in_a_new_machine() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(interview_core::storage::FileStore::open(tmp.path()).unwrap());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
    ));
    let config = InterviewConfig::default();

    let first = InterviewStateMachine::new(
        &config,
        Arc::new(ScriptedBackend::new(vec![ScriptedReply::fragments([
            "What draws you to it?",
        ])])),
        store.clone(),
        clock.clone(),
    )
    .unwrap();
    let mut session = first.open_session(id("user_p"), None);
    first.acknowledge_welcome(&mut session, true).unwrap();
    first
        .submit_response(&mut session, "Consulting", |_| {})
        .await
        .unwrap();
    store.save_session(&session).unwrap();

    let second = InterviewStateMachine::new(
        &config,
        Arc::new(ScriptedBackend::new(vec![ScriptedReply::fragments(["x7y8"])])),
        store.clone(),
        clock.clone(),
    )
    .unwrap();
    let stored = store.load_session(&id("user_p")).unwrap();
    let mut resumed = second.open_session(id("user_p"), stored);
    assert_eq!(resumed.stage, Stage::Interview);
    assert_eq!(resumed.transcript, session.transcript);

    second
        .submit_response(&mut resumed, "The variety", |_| {})
        .await
        .unwrap();
    assert_eq!(resumed.stage, Stage::Survey);
    assert!(second.gate().is_interview_finalized(&resumed.id));
    assert!(tmp
        .path()
        .join("backups")
        .read_dir()
        .unwrap()
        .any(|e| e.unwrap().file_name().to_string_lossy().contains("_backup_inprogress_")));
}
