//! Wayfinder - in-page product tour engine
//!
//! Command line entry point: headless runs against page fixtures, one-shot
//! placement and configuration checks.

mod cli;
mod cmd_config;
mod cmd_place;
mod cmd_run;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wayfinder_config::{ConfigLoader, EngineConfig, LoggingConfig};

use crate::cli::{Cli, Commands};
use crate::cmd_config::handle_check_config;
use crate::cmd_place::{handle_place, PlaceRequest};
use crate::cmd_run::{handle_run, RunOptions};

/// Get the ~/.wayfinder directory path.
fn wayfinder_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".wayfinder"))
        .unwrap_or_else(|| PathBuf::from(".wayfinder"))
}

/// Explicit path, or ~/.wayfinder/config.toml when it exists.
fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = wayfinder_dir().join("config.toml");
        default.exists().then_some(default)
    })
}

/// Initialize tracing with console output and, when a directory is
/// configured, daily-rotated log files.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let file_layer = match &logging.directory {
        Some(directory) => {
            let log_dir = PathBuf::from(ConfigLoader::expand_path(directory));
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("wayfinder")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes on drop; must outlive the subscriber.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // Console logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = config_path(cli.config);

    // check-config reports load errors itself.
    let config = match &cli.command {
        Commands::CheckConfig { .. } => EngineConfig::default(),
        _ => ConfigLoader::load_or_default(config_path.as_deref())?,
    };
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Run {
            page,
            flows,
            launchers,
            activate,
            press,
            embed_key,
            settle_ms,
        } => {
            let options = RunOptions {
                page,
                flows,
                launchers,
                activate,
                press,
                embed_key,
                settle: Duration::from_millis(settle_ms),
            };
            handle_run(options, config).await
        }
        Commands::Place {
            target,
            size,
            side,
            corner,
            offset,
            viewport,
        } => {
            let request = PlaceRequest {
                target,
                size,
                side,
                corner,
                offset,
                viewport,
            };
            handle_place(request, config.positioner)
        }
        Commands::CheckConfig { path } => {
            let path: Option<&Path> = path.as_deref().or(config_path.as_deref());
            handle_check_config(path)
        }
    }
}
