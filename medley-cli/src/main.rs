//! Medley CLI - Command-line interface
//!
//! Resolves media and streaming providers from the terminal and prints JSON.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use medley_core::tracing_setup::{CliLogLevel, init_tracing};
use medley_core::{MedleyConfig, RuntimeMode};

#[derive(Parser)]
#[command(name = "medley")]
#[command(about = "Multi-source media resolution and streaming provider aggregation")]
#[command(version)]
struct Cli {
    /// Runtime mode (production or development); overrides MEDLEY_MODE
    #[arg(long, global = true)]
    mode: Option<RuntimeMode>,

    /// Console log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: CliLogLevel,

    /// Directory for the per-run debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Probe provider URLs for availability
    #[arg(long, global = true)]
    probe: bool,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    let mut config = MedleyConfig::from_env();
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.probe {
        config.probe.enabled = true;
    }

    commands::handle_command(cli.command, &config).await
}
