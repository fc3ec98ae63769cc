//! SnapKV server entry point.
//!
//! Parses flags, restores the snapshot, then serves clients until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use snapkv::config::{Args, ServerConfig};
use snapkv::storage::Store;
use snapkv::{server, snapshot};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = Arc::new(ServerConfig::from(args));
    let store = Arc::new(Store::new());

    match config.snapshot_path() {
        Some(path) => info!(path = %path.display(), "Snapshot file"),
        None => info!("No snapshot file configured"),
    }

    // A snapshot that cannot be read leaves the store empty rather than
    // stopping the server.
    if let Err(e) = snapshot::restore(&store, &config) {
        error!(error = %e, "Failed to load snapshot, starting empty");
    }

    let bind_address = format!("{}:{}", snapkv::DEFAULT_HOST, snapkv::DEFAULT_PORT);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!(version = snapkv::VERSION, "Listening on {}", bind_address);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = server::run(listener, store, config) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}
