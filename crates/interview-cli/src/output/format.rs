use interview_core::model::Stage;
use interview_core::RenderedTranscript;
use serde_json::json;

use super::OutputFormat;

/// What `interview status` knows about one session.
pub struct StatusReport {
    pub session_id: String,
    pub is_test_identity: bool,
    pub survey_completed: bool,
    pub interview_finalized: bool,
    pub stored_stage: Option<Stage>,
    pub turns: usize,
}

pub fn format_status(report: &StatusReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "session_id": report.session_id,
            "is_test_identity": report.is_test_identity,
            "survey_completed": report.survey_completed,
            "interview_finalized": report.interview_finalized,
            "stored_stage": report.stored_stage.map(|s| s.as_str()),
            "turns": report.turns,
        }))
        .unwrap_or_default(),
        OutputFormat::Text => format_status_text(report),
    }
}

fn format_status_text(report: &StatusReport) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut out = String::new();
    out.push_str(&format!("Session:             {}", report.session_id));
    if report.is_test_identity {
        out.push_str(" (test identity)");
    }
    out.push('\n');
    out.push_str(&format!(
        "Survey completed:    {}\n",
        yes_no(report.survey_completed)
    ));
    out.push_str(&format!(
        "Interview finalized: {}\n",
        yes_no(report.interview_finalized)
    ));
    match report.stored_stage {
        Some(stage) => out.push_str(&format!(
            "Saved stage:         {stage} ({} turns)\n",
            report.turns
        )),
        None => out.push_str("Saved stage:         (no saved state)\n"),
    }
    out
}

pub fn format_rendered(
    session_id: Option<&str>,
    rendered: &RenderedTranscript,
    fmt: OutputFormat,
) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "session_id": session_id,
            "transcript": rendered.as_str(),
        }))
        .unwrap_or_default(),
        OutputFormat::Text if rendered.is_empty() => "(empty transcript)".to_string(),
        OutputFormat::Text => rendered.to_string(),
    }
}
