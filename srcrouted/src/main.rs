//! srcrouted, the source-address policy routing daemon.
//!
//! Thin glue around the synchronization engine: parse the command line and
//! configuration file, set up logging and signals, run the engine, map the
//! outcome to an exit code.

use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use srcrouted_engine::{Engine, EngineError, Mapping};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

use cli::Cli;
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("srcrouted: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = init_logging(&config) {
        eprintln!("srcrouted: cannot set up logging: {error}");
        return ExitCode::FAILURE;
    }
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let mapping = match Mapping::from_entries(&config.networks) {
        Ok(mapping) => mapping,
        Err(error) => {
            tracing::error!(%error, "invalid interface mapping");
            return ExitCode::FAILURE;
        }
    };
    if mapping.is_empty() {
        tracing::warn!("no managed interfaces configured, nothing will be mirrored");
    }

    match run(mapping).await {
        Ok(()) => {
            tracing::info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(mapping: Mapping) -> Result<(), EngineError> {
    let engine = Engine::new(mapping)?;

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("received SIGINT"),
            _ = terminate.recv() => tracing::info!("received SIGTERM"),
        }
    };

    engine.run(shutdown).await
}

fn init_logging(config: &Config) -> io::Result<()> {
    // Levels 4 and 5 both map to error: tracing has no fatal level.
    let level = match config.log_level {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        _ => "error",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match &config.log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(config.log_color)
                .init();
        }
    }
    Ok(())
}
