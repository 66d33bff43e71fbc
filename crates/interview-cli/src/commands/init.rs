use anyhow::{Context, Result};
use clap::Args;
use interview_core::config::InterviewConfig;

use crate::context::{AppContext, Paths};

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, paths: &Paths) -> Result<()> {
    if paths.config.exists() && !args.force {
        println!("Config already exists at {}.", paths.config.display());
        println!("Use --force to overwrite it.");
    } else {
        InterviewConfig::write_default(&paths.config)
            .with_context(|| format!("Failed to write {}", paths.config.display()))?;
        println!("Wrote default config to {}.", paths.config.display());
    }

    let ctx = AppContext::load(paths)?;
    let store = ctx.open_store()?;
    println!("Data directory ready at {}.", store.layout().root().display());
    println!();
    println!("Next steps:");
    println!(
        "  export {}=...                 API key for the configured model",
        ctx.config.backend.api_key_var()
    );
    println!("  interview run                      Start an interview");
    println!("  interview run --test               Rehearse as the test identity");
    Ok(())
}
