use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use interview_core::model::{SessionId, Transcript};
use interview_core::storage::DurableStore;

use crate::context::{AppContext, Paths};
use crate::output::format::format_rendered;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct RenderArgs {
    /// Session ID whose final transcript to render
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub id: Option<String>,

    /// Render a transcript JSON file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub fn run(args: &RenderArgs, paths: &Paths, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::load(paths)?;
    let registry = ctx
        .config
        .sentinel_registry()
        .context("Invalid sentinel configuration")?;

    let (id, transcript) = match (&args.id, &args.file) {
        (_, Some(path)) => {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let transcript = Transcript::from_json(&data)
                .with_context(|| format!("{} is not a transcript", path.display()))?;
            (None, transcript)
        }
        (Some(id), None) => {
            let id = SessionId::parse(id.as_str()).context("Invalid session ID")?;
            let store = ctx.open_store()?;
            let Some(transcript) = store
                .read_final_transcript(&id)
                .with_context(|| format!("Failed to read final transcript for {id}"))?
            else {
                anyhow::bail!("No final transcript for {id}. Has the interview finished?");
            };
            (Some(id), transcript)
        }
        (None, None) => anyhow::bail!("Pass a session ID or --file"),
    };

    let rendered = interview_core::render(&transcript, &registry);
    println!(
        "{}",
        format_rendered(id.as_ref().map(SessionId::as_str), &rendered, format)
    );
    Ok(())
}
