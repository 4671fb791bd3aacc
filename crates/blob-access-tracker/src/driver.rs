//! Storage driver wrapper that records blob access
//!
//! [`TrackingDriver`] forwards every call to the wrapped store unchanged and,
//! only after the underlying call has succeeded, records the access against
//! the [`AccessTracker`]. Tracking can never turn a successful store call into
//! an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::digest::{extract_digest, Digest};
use crate::error::StorageResult;
use crate::storage::{BlobReader, FileInfo, FileWriter, StorageDriver};
use crate::tracker::AccessTracker;

pub struct TrackingDriver<D: ?Sized> {
    inner: Arc<D>,
    tracker: AccessTracker,
}

impl<D: StorageDriver + ?Sized> TrackingDriver<D> {
    pub fn new(inner: Arc<D>, tracker: AccessTracker) -> Self {
        Self { inner, tracker }
    }

    pub fn inner(&self) -> &Arc<D> {
        &self.inner
    }

    pub fn tracker(&self) -> &AccessTracker {
        &self.tracker
    }
}

/// Stat `path` on the wrapped store and record a write of `digest`.
async fn record_committed<D: StorageDriver + ?Sized>(
    store: &D,
    tracker: &AccessTracker,
    path: &str,
    digest: &Digest,
) {
    match store.stat(path).await {
        Ok(info) => tracker.record_write(digest, info.size).await,
        Err(e) => warn!(digest = %digest, path, error = %e, "Failed to stat committed blob"),
    }
}

#[async_trait]
impl<D: StorageDriver + ?Sized + 'static> StorageDriver for TrackingDriver<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_content(&self, path: &str) -> StorageResult<Vec<u8>> {
        let content = self.inner.get_content(path).await?;

        if let Some(digest) = extract_digest(path) {
            self.tracker
                .record_access(&digest, content.len() as u64)
                .await;
        }

        Ok(content)
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        self.inner.put_content(path, content).await
    }

    async fn reader(&self, path: &str, offset: u64) -> StorageResult<BlobReader> {
        let reader = self.inner.reader(path, offset).await?;

        if let Some(digest) = extract_digest(path) {
            match self.inner.stat(path).await {
                Ok(info) => self.tracker.record_access(&digest, info.size).await,
                Err(e) => debug!(digest = %digest, path, error = %e, "Skipped access tracking"),
            }
        }

        Ok(reader)
    }

    async fn writer(&self, path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>> {
        let writer = self.inner.writer(path, append).await?;

        Ok(Box::new(TrackingWriter {
            inner: writer,
            digest: extract_digest(path),
            path: path.to_string(),
            store: Arc::clone(&self.inner),
            tracker: self.tracker.clone(),
        }))
    }

    async fn stat(&self, path: &str) -> StorageResult<FileInfo> {
        self.inner.stat(path).await
    }

    async fn move_path(&self, source: &str, dest: &str) -> StorageResult<()> {
        self.inner.move_path(source, dest).await?;

        if let Some(digest) = extract_digest(dest) {
            record_committed(self.inner.as_ref(), &self.tracker, dest, &digest).await;
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.inner.delete(path).await
    }
}

/// Write handle that records the blob only once the write is committed.
///
/// The digest is extracted when the writer is opened; writes that are
/// cancelled or never committed leave no trace in the tracker.
pub struct TrackingWriter<D: ?Sized> {
    inner: Box<dyn FileWriter>,
    digest: Option<Digest>,
    path: String,
    store: Arc<D>,
    tracker: AccessTracker,
}

impl<D: ?Sized> TrackingWriter<D> {
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }
}

#[async_trait]
impl<D: StorageDriver + ?Sized + 'static> FileWriter for TrackingWriter<D> {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        self.inner.write(data).await
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.inner.commit().await?;

        if let Some(digest) = &self.digest {
            record_committed(self.store.as_ref(), &self.tracker, &self.path, digest).await;
        }

        Ok(())
    }

    async fn cancel(&mut self) -> StorageResult<()> {
        self.inner.cancel().await
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.inner.close().await
    }
}
