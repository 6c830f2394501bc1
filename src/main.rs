#![forbid(unsafe_code)]

//! `lexstream` — staged analysis pipeline CLI.
//!
//! Bootstraps configuration and logging, waits on the upstream transcript
//! step for a session identifier, runs the three-stage streaming pipeline
//! to completion, and prints each stage's final text.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use lexstream::config::GlobalConfig;
use lexstream::gate::{HttpSessionGate, SessionSource};
use lexstream::models::stage::StageStatus;
use lexstream::pipeline::orchestrator::PipelineOrchestrator;
use lexstream::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "lexstream", about = "Staged streaming analysis pipeline", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the analysis service base URL from the config file.
    #[arg(long)]
    base_url: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("lexstream pipeline bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config_text = std::fs::read_to_string(&args.config)
        .map_err(|err| AppError::Config(format!("cannot read config: {err}")))?;
    let mut config = GlobalConfig::from_toml_str(&config_text)?;

    if let Some(base) = args.base_url {
        config.api_base_url = base.trim_end_matches('/').to_owned();
    }
    let config = Arc::new(config);
    info!(api_base_url = %config.api_base_url, "configuration loaded");

    // ── Build the pipeline ──────────────────────────────
    let mut orchestrator = PipelineOrchestrator::new(Arc::clone(&config))?;

    // Ctrl-C / SIGTERM tears the pipeline down.
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        cancel.cancel();
    });

    // ── Wait for the upstream transcript step ───────────
    let gate = HttpSessionGate::new(&config)?;
    info!("waiting for upstream transcript session");
    let session_id = gate.acquire().await.map_err(|err| {
        error!(%err, "session acquisition failed");
        err
    })?;

    // ── Run the pipeline to completion ──────────────────
    orchestrator.set_session(session_id);
    let snapshot = orchestrator.run_until_complete().await?;

    for stage in &snapshot.stages {
        println!("\n## {}\n", stage.kind.title());
        if stage.status == StageStatus::Failed {
            println!("(stage failed)");
        }
        println!("{}", stage.text);
    }

    info!(
        progress = snapshot.progress,
        all_complete = snapshot.all_complete,
        "lexstream finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
