//! Blob deletion for the cleanup scheduler

use async_trait::async_trait;
use blob_access_tracker::{
    blob_dir_path, BlobDeleter, DeleteError, DeleteOutcome, Digest, StorageDriver,
};
use std::sync::Arc;
use tracing::debug;

/// Removes a blob's directory from the raw store.
///
/// Goes around the tracking layer so deletions are never recorded as
/// accesses. Content that is already missing is reported as
/// [`DeleteOutcome::AlreadyGone`].
pub struct StoreBlobDeleter {
    store: Arc<dyn StorageDriver>,
}

impl StoreBlobDeleter {
    pub fn new(store: Arc<dyn StorageDriver>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BlobDeleter for StoreBlobDeleter {
    async fn delete(&self, digest: &Digest) -> Result<DeleteOutcome, DeleteError> {
        let path = blob_dir_path(digest);
        match self.store.delete(&path).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => {
                debug!(digest = %digest, path = %path, "Blob content already gone");
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(e) => Err(e.into()),
        }
    }
}
