//! Error types for the registry cache server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blob_access_tracker::digest::DigestParseError;
use blob_access_tracker::{DeleteError, StorageError, TrackerError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid digest: {0}")]
    InvalidDigest(#[from] DigestParseError),

    #[error("Digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Delete error: {0}")]
    Delete(#[from] DeleteError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidDigest(_) | ServerError::DigestMismatch { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::BlobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Storage(e) if e.is_not_found() => {
                (StatusCode::NOT_FOUND, "Blob not found".to_string())
            }
            _ => {
                tracing::error!(error = %self, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
