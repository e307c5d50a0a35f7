//! Katara CLI - recycling assistant client

mod commands;
mod config;
mod host;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use katara_core::StateDir;
use katara_http::ClientError;
use katara_http::client::error::SESSION_EXPIRED;
use std::path::PathBuf;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "katara")]
#[command(about = "Ask how to recycle, recognize waste from photos and find drop-off points")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Directory for settings, session, cache and logs
    #[arg(short = 'd', long, global = true, env = "KATARA_STATE_DIR")]
    data_dir: Option<PathBuf>,

    /// Backend URL for this invocation, overriding the settings file
    #[arg(long, global = true)]
    api: Option<String>,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let state_dir = cli
        .data_dir
        .map_or_else(StateDir::new, StateDir::with_override);
    logging::init_logging(cli.log_level.into(), &state_dir, "cli", cli.no_file_log)?;
    state_dir.create_directories().await?;

    info!("Starting Katara CLI");

    match cli.command.execute(state_dir, cli.api).await {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("{}", notice(&e));
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Text shown to the user for a failed command
fn notice(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        Some(e) if e.is_auth_expired() => {
            format!("{SESSION_EXPIRED} Run `katara auth login`.")
        }
        Some(e) => e.user_message(),
        None => err.to_string(),
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
