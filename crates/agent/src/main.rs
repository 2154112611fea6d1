// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protekt Agent daemon (pkd)
//!
//! Offline-first endpoint monitoring and protection agent. Observes the
//! host, runs local detection heuristics, keeps encrypted backups, and
//! reports to the SaaS backend through a durable offline queue.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};

use pk_agent::lifecycle::Daemon;
use pk_core::Config;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pkd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("pkd {}", env!("CARGO_PKG_VERSION"));
                println!("Protekt Agent daemon - offline-first endpoint monitoring and protection");
                println!();
                println!("USAGE:");
                println!("    pkd");
                println!();
                println!("Configuration is read from PK_CONFIG (default ./config.toml).");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: pkd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    // Load configuration; a broken config file is a fatal startup error
    let config_path =
        std::env::var("PK_CONFIG").map_or_else(|_| PathBuf::from("config.toml"), PathBuf::from);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let log_path = config.logs_dir().join("agent.log");
    rotate_log_if_needed(&log_path);
    write_startup_marker(&log_path);
    let _log_guard = setup_logging(&config, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting Protekt agent");

    let daemon = match Daemon::start(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "failed to start agent");
            eprintln!("error: failed to start agent: {e}");
            std::process::exit(1);
        }
    };

    info!("agent ready");

    // Graceful shutdown on SIGTERM / SIGINT
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    daemon.shutdown().await;
    Ok(())
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (agent.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the agent log at startup if it has grown too large.
///
/// Shifts `agent.log` → `agent.log.1` → `agent.log.2` → `agent.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the agent still starts.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Append a startup marker before tracing is up, so the line is present
/// even when the process dies during initialization.
fn write_startup_marker(log_path: &Path) {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        let _ = writeln!(file, "--- pkd: starting (pid: {}) ---\n", std::process::id());
    }
}

fn setup_logging(
    config: &Config,
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let directory = log_path.parent().unwrap_or(Path::new("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "agent.log".to_string());

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.agent.log_level.to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
