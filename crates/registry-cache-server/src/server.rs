//! HTTP server for the blob cache
//!
//! Provides /health, /blobs/{digest} for reads and verified uploads, and a
//! /debug surface for stats, manual cleanup and out-of-band removal.

use crate::deleter::StoreBlobDeleter;
use crate::error::{Result, ServerError};
use crate::types::{HealthResponse, RemoveResponse};
use crate::upload::store_blob;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use blob_access_tracker::digest::REGISTRY_ROOT;
use blob_access_tracker::{
    blob_data_path, AccessTracker, BlobDeleter, CleanupReport, CleanupScheduler, DeleteOutcome,
    Digest, StorageDriver, TrackerStats, TrackingDriver,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

const DOCKER_CONTENT_DIGEST: HeaderName = HeaderName::from_static("docker-content-digest");

/// Shared state for the HTTP server
pub struct ServerState {
    /// Untracked store, used for deletions and upload housekeeping.
    pub store: Arc<dyn StorageDriver>,
    /// The same store seen through the tracking layer.
    pub driver: TrackingDriver<dyn StorageDriver>,
    pub tracker: AccessTracker,
    pub deleter: Arc<dyn BlobDeleter>,
    pub scheduler: Arc<CleanupScheduler>,
    pub started_at: DateTime<Utc>,
    pub max_upload_size: usize,
    upload_seq: AtomicU64,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn StorageDriver>,
        tracker: AccessTracker,
        cleanup_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let deleter: Arc<dyn BlobDeleter> = Arc::new(StoreBlobDeleter::new(Arc::clone(&store)));
        let scheduler = CleanupScheduler::with_shutdown(
            tracker.clone(),
            Arc::clone(&deleter),
            cleanup_interval,
            shutdown,
        );

        Self {
            driver: TrackingDriver::new(Arc::clone(&store), tracker.clone()),
            store,
            tracker,
            deleter,
            scheduler,
            started_at: Utc::now(),
            max_upload_size: 1024 * 1024 * 1024,
            upload_seq: AtomicU64::new(0),
        }
    }

    pub fn with_max_upload_size(mut self, max_upload_size: usize) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    fn next_upload_dir(&self) -> String {
        let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}/repositories/_uploads/{}-{}",
            REGISTRY_ROOT,
            self.started_at.timestamp_millis(),
            seq
        )
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let max_upload_size = state.max_upload_size;

    Router::new()
        .route("/health", get(health))
        .route("/debug/stats", get(stats))
        .route("/debug/cleanup", post(trigger_cleanup))
        .route("/debug/blobs/{digest}", delete(remove_blob))
        .route(
            "/blobs/{digest}",
            get(get_blob)
                .put(put_blob)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server, returning once `shutdown` resolves and in-flight
/// requests have drained.
pub async fn start_server<F>(state: SharedState, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cleanup_running: state.scheduler.is_running(),
        tracker: state.tracker.stats().await,
    })
}

async fn stats(State(state): State<SharedState>) -> Json<TrackerStats> {
    Json(state.tracker.stats().await)
}

/// Run a cleanup cycle now, waiting for one already in progress.
async fn trigger_cleanup(State(state): State<SharedState>) -> Json<CleanupReport> {
    info!("Manual cleanup requested");
    Json(state.scheduler.run_once().await)
}

/// Delete a blob's content and stop tracking it, regardless of age.
async fn remove_blob(
    State(state): State<SharedState>,
    Path(digest): Path<String>,
) -> Result<Json<RemoveResponse>> {
    let digest = Digest::parse(&digest)?;

    let outcome = state.deleter.delete(&digest).await?;
    let removed = state.tracker.remove(&digest).await?;
    info!(digest = %digest, ?outcome, "Blob removed on request");

    Ok(Json(RemoveResponse {
        digest: digest.to_string(),
        content_deleted: outcome == DeleteOutcome::Deleted,
        was_tracked: removed.is_some(),
    }))
}

/// Serve blob content through the tracking layer
async fn get_blob(
    State(state): State<SharedState>,
    Path(digest): Path<String>,
) -> Result<Response> {
    let digest = Digest::parse(&digest)?;

    let data = state
        .driver
        .get_content(&blob_data_path(&digest))
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ServerError::BlobNotFound(digest.to_string())
            } else {
                e.into()
            }
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (DOCKER_CONTENT_DIGEST, digest.to_string()),
        ],
        data,
    )
        .into_response())
}

/// Upload blob content, verified against the digest in the path
async fn put_blob(
    State(state): State<SharedState>,
    Path(digest): Path<String>,
    body: Bytes,
) -> Result<Response> {
    let digest = Digest::parse(&digest)?;

    let upload_dir = state.next_upload_dir();
    let upload_path = format!("{}/data", upload_dir);
    let stored = store_blob(&state.driver, &digest, &body, &upload_path).await;

    // Whatever happened, the staging directory is no longer needed.
    if let Err(e) = state.store.delete(&upload_dir).await {
        if !e.is_not_found() {
            warn!(path = %upload_dir, error = %e, "Failed to remove upload directory");
        }
    }

    let size = stored?;
    info!(digest = %digest, size, "Blob uploaded");

    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, format!("/blobs/{}", digest)),
            (DOCKER_CONTENT_DIGEST, digest.to_string()),
        ],
        Json(serde_json::json!({ "digest": digest.to_string(), "size": size })),
    )
        .into_response())
}
