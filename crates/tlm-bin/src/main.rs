//! CLI entry point for the telemetry logger.
//!
//! Run a pipeline described by a configuration file:
//! ```bash
//! telemetry-logger run --config telemetry.toml
//! telemetry-logger run --config telemetry.toml --log-level debug --json
//! ```
//!
//! Validate a configuration and print its effective values:
//! ```bash
//! telemetry-logger check --config telemetry.toml
//! ```
//!
//! Ctrl-C stops sampling; records already queued are still written.

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tlm_app::tracing_setup::{self, OutputFormat, TracingConfig};
use tlm_app::{load_config, App};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "telemetry-logger")]
#[command(about = "Sample telemetry, classify it, and log records to sinks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline until the source is exhausted or Ctrl-C
    Run {
        /// Configuration file (TOML); TLM_* environment variables override it
        #[arg(long)]
        config: PathBuf,

        /// Override the configured log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,

        /// Emit logs as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file and print the effective configuration
    Check {
        /// Configuration file (TOML)
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            log_level,
            json,
        } => run(config, log_level, json).await,
        Commands::Check { config } => check(config),
    }
}

async fn run(path: PathBuf, log_level: Option<String>, json: bool) -> Result<()> {
    let mut config = load_config(&path)?;
    if let Some(level) = log_level {
        config.log_level = level;
        config.validate().context("invalid --log-level")?;
    }

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Compact
    };
    let tracing_config = TracingConfig::from_app_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_format(format);
    tracing_setup::init(tracing_config).map_err(anyhow::Error::msg)?;

    let app = App::from_config(config)?;
    let pipeline = app.pipeline()?;
    let stop = pipeline.stop_handle();
    info!(config = %path.display(), "starting telemetry logger");

    // The pipeline blocks on its own threads; keep the runtime free for signals.
    let mut running = tokio::task::spawn_blocking(move || pipeline.run());
    let joined = tokio::select! {
        joined = &mut running => joined,
        interrupted = signal::ctrl_c() => {
            match interrupted {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    stop.stop();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
            running.await
        }
    };

    let report = joined.context("pipeline thread failed")??;
    println!("{report}");
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let config = load_config(&path)?;
    let rendered = config
        .to_toml_string()
        .context("failed to render configuration")?;
    println!("{rendered}");
    println!("# {} is valid", path.display());
    Ok(())
}
