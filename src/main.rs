//! Headline signal bot binary.
//! Loads config, sets up logging and signal handling, then runs the pipeline.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use headline_signal_bot::bootstrap::build_orchestrator;
use headline_signal_bot::config::{resolve_config_path, BotConfig};

#[derive(Debug, Parser)]
#[command(name = "headline-signal-bot", version, about)]
struct Cli {
    /// Path to the TOML config (default: $HEADLINE_BOT_CONFIG or config/bot.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating log dir {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().compact().with_writer(std::io::stderr)))
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e:#}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Invalid configuration ends the process here, before any cycle runs.
    let path = resolve_config_path(cli.config);
    let cfg = BotConfig::load_from_file(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    init_tracing(cli.json_logs, cfg.log_file.as_deref())?;
    tracing::info!(config = %path.display(), "headline signal bot starting");

    let mut orchestrator = build_orchestrator(&cfg)
        .await
        .context("building pipeline")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, finishing in-flight work");
        let _ = stop_tx.send(true);
    });

    if cli.once {
        let report = orchestrator.run_cycle(&stop_rx).await;
        tracing::info!(?report, "single cycle done");
    } else {
        orchestrator.run(stop_rx).await;
    }

    tracing::info!("clean shutdown complete");
    Ok(())
}
