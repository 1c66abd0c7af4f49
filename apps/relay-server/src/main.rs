//! Relay Server - standalone Icecast-compatible stream relay binary.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::api::{start_server, AppState};
use relay_core::{Lifecycle, ServerLifecycle};
use tokio::signal;

/// Standalone Icecast-compatible relay server.
#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "RELAY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file and `RELAY_BIND_PORT`).
    #[arg(short = 'p', long, env = "RELAY_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("relay-server v{}", env!("CARGO_PKG_VERSION"));

    let mut relay_config =
        config::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(port) = args.port {
        relay_config.bind_port = port;
    }

    log::info!(
        "configuration: bind_port={}, mounts={}, listener_limit={}, source_limit={}",
        relay_config.bind_port,
        relay_config.mounts.len(),
        relay_config.listener_limit,
        relay_config.source_limit,
    );

    let state = AppState::new(relay_config);
    let lifecycle = ServerLifecycle;

    if let Err(e) = start_server(state, shutdown_signal()).await {
        log::error!("server error: {e}");
        lifecycle.request_shutdown(1);
    }

    log::info!("shutdown complete");
    Ok(())
}

/// Resolves when Ctrl+C or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
