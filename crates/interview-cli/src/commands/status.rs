use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use interview_core::model::SessionId;
use interview_core::SurveyGate;

use crate::context::{AppContext, Paths};
use crate::output::format::{format_status, StatusReport};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct StatusArgs {
    /// Session ID
    pub id: String,
}

pub fn run(args: &StatusArgs, paths: &Paths, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load(paths)?;
    let store = Arc::new(ctx.open_store()?);
    let id = SessionId::parse(args.id.as_str()).context("Invalid session ID")?;
    let gate = SurveyGate::new(store.clone(), ctx.config.interview.test_identity.clone());

    let stored = store
        .load_session(&id)
        .with_context(|| format!("Failed to read saved state for {id}"))?;
    let report = StatusReport {
        session_id: id.to_string(),
        is_test_identity: gate.is_test_identity(&id),
        survey_completed: gate.is_survey_completed(&id),
        interview_finalized: gate.is_interview_finalized(&id),
        stored_stage: stored.as_ref().map(|s| s.stage),
        turns: stored.as_ref().map_or(0, |s| s.transcript.len()),
    };
    print!("{}", format_status(&report, format));
    if matches!(format, OutputFormat::Json) {
        println!();
    }
    Ok(())
}
