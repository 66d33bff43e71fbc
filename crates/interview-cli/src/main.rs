use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use interview_core::config::settings::DEFAULT_CONFIG_FILE;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod context;
mod output;

#[derive(Parser)]
#[command(
    name = "interview",
    version,
    about = "Run AI-led research interviews followed by a short survey"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Data directory (overrides storage.data_dir)
    #[arg(long, global = true, env = "INTERVIEW_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let paths = context::Paths {
        config: cli.config,
        data_dir: cli.data_dir,
    };

    match &cli.command {
        commands::Commands::Init(args) => commands::init::run(args, &paths),
        commands::Commands::Run(args) => commands::run::run(args, &paths),
        commands::Commands::Status(args) => commands::status::run(args, &paths, cli.format),
        commands::Commands::Render(args) => commands::render::run(args, &paths, cli.format),
    }
}
