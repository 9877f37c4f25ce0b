//! driftd - Drift coordination daemon.
//!
//! Pairs anonymous strangers into two-party chat sessions and relays
//! their messages and call signaling.

mod config;
mod error;
mod handlers;
mod heartbeat;
mod moderation;
mod network;
mod reconnect;
mod relay;
mod state;
mod store;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Core;
use crate::store::memory::{MemoryHotStore, MemoryMessageStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `drift.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "drift.toml".to_string(),
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log_format)
    let config_path = resolve_config_path();

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;

    // Initialize tracing based on config
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.server.log_format {
        config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        config::LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    // Validate configuration
    if let Err(errors) = config::validate(&config) {
        for err in &errors {
            error!(error = %err, "Configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        grace_period_ms = config.timing.grace_period_ms,
        ping_interval_ms = config.timing.ping_interval_ms,
        pong_timeout_ms = config.timing.pong_timeout_ms,
        "Starting driftd"
    );

    let listen_addr: std::net::SocketAddr = config.server.listen.parse()?;

    // In-process stores; a deployment with external persistence swaps
    // these behind the same traits.
    let messages = Arc::new(MemoryMessageStore::new(config.limits.max_message_len));
    let hot = Arc::new(MemoryHotStore::new());

    let core = Arc::new(Core::new(config, messages, hot));
    info!("Core initialized");

    // Background workers: liveness probing and queue sweeping.
    heartbeat::spawn_heartbeat(Arc::clone(&core));
    heartbeat::spawn_queue_sweeper(Arc::clone(&core));

    // Signal handler for graceful shutdown.
    let shutdown = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT - shutting down"),
            _ = sigterm.recv() => info!("Received SIGTERM - shutting down"),
        }
    };

    let gateway = Gateway::bind(listen_addr, Arc::clone(&core)).await?;
    tokio::select! {
        result = gateway.run() => {
            result?;
        }
        () = shutdown => {}
    }

    let stats = core.stats();
    info!(
        connections = stats.connections,
        active_pairs = stats.active_pairs,
        "driftd stopped"
    );
    Ok(())
}
