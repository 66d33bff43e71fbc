pub mod init;
pub mod render;
pub mod run;
pub mod status;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the data directories
    Init(init::InitArgs),
    /// Run the welcome, interview and survey in this terminal
    Run(run::RunArgs),
    /// Show where a session stands
    Status(status::StatusArgs),
    /// Print the finalized rendering of a stored transcript
    Render(render::RenderArgs),
}
