//! Registry Cache Server - blob cache with TTL-based eviction
//!
//! Serves registry blobs from local storage, records every read and upload,
//! and periodically deletes blobs that have not been accessed within the TTL.

mod deleter;
mod error;
mod observer;
mod server;
mod types;
mod upload;

use crate::error::{Result, ServerError};
use crate::observer::LoggingObserver;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use blob_access_tracker::{AccessTracker, FilesystemDriver, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("registry_cache_server=info".parse()?)
        .add_directive("blob_access_tracker=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Registry Cache Server...");

    // Load configuration from environment
    let config = load_config()?;
    info!("Port: {}", config.port);
    info!("Storage dir: {:?}", config.storage_dir);
    info!("Cache TTL: {} seconds", config.cache_ttl_secs);
    info!("Cleanup interval: {} seconds", config.cleanup_interval_secs);

    let store = Arc::new(FilesystemDriver::new(config.data_dir()).await?);
    let tracker = AccessTracker::open_with(
        config.meta_dir(),
        Duration::from_secs(config.cache_ttl_secs),
        Arc::new(SystemClock),
        Arc::new(LoggingObserver),
    )
    .await?;

    // Flipped once on Ctrl-C or SIGTERM; cleanup and the HTTP server both watch it
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send_replace(true);
    });

    let state: SharedState = Arc::new(
        ServerState::new(
            store,
            tracker.clone(),
            Duration::from_secs(config.cleanup_interval_secs),
            shutdown_rx.clone(),
        )
        .with_max_upload_size(config.max_upload_size),
    );
    state.scheduler.start().await;

    // Start HTTP server (blocking until a shutdown signal)
    let mut server_shutdown = shutdown_rx;
    let served = start_server(Arc::clone(&state), config.port, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await;

    info!("Shutting down...");
    state.scheduler.stop().await;
    if let Err(e) = tracker.flush().await {
        error!(error = %e, "Failed to flush blob metadata on shutdown");
    }

    served.map_err(|e| ServerError::Config(format!("Server error: {}", e)))?;
    info!("Shutdown complete");
    Ok(())
}

fn load_config() -> Result<ServerConfig> {
    let defaults = ServerConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let storage_dir = std::env::var("STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.storage_dir);

    let cache_ttl_secs = std::env::var("CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.cache_ttl_secs);

    let cleanup_interval_secs = std::env::var("CLEANUP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.cleanup_interval_secs);

    let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(defaults.max_upload_size);

    if cleanup_interval_secs == 0 {
        return Err(ServerError::Config(
            "CLEANUP_INTERVAL_SECS must be greater than zero".to_string(),
        ));
    }

    Ok(ServerConfig {
        port,
        storage_dir,
        cache_ttl_secs,
        cleanup_interval_secs,
        max_upload_size,
    })
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
