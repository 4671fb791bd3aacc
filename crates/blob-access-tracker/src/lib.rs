//! Blob Access Tracker
//!
//! Time-based eviction for a content-addressable blob store. Reads, commits
//! and moves observed through [`TrackingDriver`] update an [`AccessTracker`],
//! which keeps per-digest access metadata in memory and mirrors it to disk.
//! A [`CleanupScheduler`] periodically asks the tracker for blobs whose last
//! access is older than the TTL and removes them through an injected
//! [`BlobDeleter`].
//!
//! Eviction is TTL-only. There is no capacity bound.

pub mod cleanup;
pub mod clock;
pub mod digest;
pub mod driver;
pub mod error;
pub mod hooks;
mod mirror;
pub mod storage;
pub mod tracker;
pub mod types;

pub use cleanup::{BlobDeleter, CleanupScheduler, DeleteOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use digest::{blob_data_path, blob_dir_path, extract_digest, Digest};
pub use driver::{TrackingDriver, TrackingWriter};
pub use error::{DeleteError, StorageError, StorageResult, TrackerError};
pub use hooks::{NoopObserver, TrackingObserver};
pub use storage::{BlobReader, FileInfo, FileWriter, FilesystemDriver, InMemoryDriver, StorageDriver};
pub use tracker::AccessTracker;
pub use types::{BlobMeta, CleanupReport, TrackerStats};
