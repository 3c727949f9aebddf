#![forbid(unsafe_code)]

//! `leader-commands`: leader network service binary.
//!
//! Loads configuration, starts the command server and discovery
//! broadcaster, and dispatches commands named on stdin (one per line:
//! `stash`, `sell`, `trade`, `stop`, or the wire names). `status` prints the
//! service status.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use leader_commands::identity::ConfiguredIdentity;
use leader_commands::models::command::CommandKind;
use leader_commands::sink::LogStatusSink;
use leader_commands::{AppError, GlobalConfig, LeaderService, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "leader-commands", about = "Broadcast leader commands to followers", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Leader name announced in discovery; overrides `leader_name`.
    #[arg(long)]
    leader_name: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("leader-commands bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    let config = Arc::new(config);
    info!("configuration loaded");

    let identity = ConfiguredIdentity::new(args.leader_name.or_else(|| config.leader_name.clone()));
    let service = LeaderService::start(config, Arc::new(identity), Arc::new(LogStatusSink)).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => handle_trigger(&service, line.trim()).await,
                    Ok(None) => {
                        info!("stdin closed, no further triggers");
                        stdin_open = false;
                    }
                    Err(err) => {
                        warn!(%err, "failed to read trigger from stdin");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    service.stop().await;
    info!("leader-commands shut down");
    Ok(())
}

async fn handle_trigger(service: &LeaderService, trigger: &str) {
    if trigger.is_empty() {
        return;
    }
    if trigger.eq_ignore_ascii_case("status") {
        info!(status = ?service.status(), "service status");
        return;
    }

    match trigger.parse::<CommandKind>() {
        Ok(command) => {
            let outcome = service.trigger(command).await;
            info!(%command, ?outcome, "trigger handled");
        }
        Err(err) => warn!(%err, "unknown trigger"),
    }
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
