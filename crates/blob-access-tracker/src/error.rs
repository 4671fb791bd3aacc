//! Error types for blob access tracking

use std::path::PathBuf;
use thiserror::Error;

use crate::digest::Digest;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by a wrapped [`StorageDriver`](crate::StorageDriver).
///
/// The tracking layer never produces these itself; it only forwards them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid offset {offset} for {path}")]
    InvalidOffset { path: String, offset: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to initialize metadata directory {path:?}: {source}")]
    MetadataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata mirror I/O error at {path:?}: {source}")]
    Mirror {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata encode error for {digest}: {source}")]
    Encode {
        digest: Digest,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure reported by a [`BlobDeleter`](crate::BlobDeleter).
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Delete rejected: {0}")]
    Rejected(String),
}
