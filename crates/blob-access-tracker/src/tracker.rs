//! In-memory access tracking with a durable on-disk mirror
//!
//! The in-memory map is the source of truth for expiry decisions. Updates are
//! mirrored to disk out of band: each update marks its digest dirty and, if it
//! was not dirty already, spawns one persistence task. That task writes the
//! entry as it is *when the task runs*, so a burst of updates to one digest
//! coalesces into a single write of the latest state and the mirror never
//! regresses to an older update.
//!
//! All mirror I/O (persist, remove, flush) is serialized by one mirror lock.
//! Removal drops the in-memory entry and deletes the mirror record while
//! holding it, so a persistence task scheduled before a removal cannot
//! recreate the record afterwards.

use crate::clock::{Clock, SystemClock};
use crate::digest::Digest;
use crate::error::Result;
use crate::hooks::{NoopObserver, TrackingObserver};
use crate::mirror::MetadataMirror;
use crate::types::{BlobMeta, TrackerStats};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Tracks last access time, size and creation time per blob digest.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AccessTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    entries: RwLock<HashMap<Digest, BlobMeta>>,
    mirror: MetadataMirror,
    mirror_lock: Mutex<()>,
    pending: Mutex<PendingMirror>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn TrackingObserver>,
}

#[derive(Default)]
struct PendingMirror {
    /// Digests with a persistence task scheduled but not yet started.
    dirty: HashSet<Digest>,
    /// Digests whose last persistence attempt failed.
    unsaved: HashSet<Digest>,
    /// Removed digests whose mirror record could not be deleted.
    orphaned: HashSet<Digest>,
}

impl AccessTracker {
    /// Open a tracker over `meta_dir` using the system clock and no observer.
    pub async fn open(meta_dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        Self::open_with(
            meta_dir,
            ttl,
            Arc::new(SystemClock),
            Arc::new(NoopObserver),
        )
        .await
    }

    /// Open a tracker, creating the metadata directory and loading any
    /// previously persisted entries.
    pub async fn open_with(
        meta_dir: impl Into<PathBuf>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn TrackingObserver>,
    ) -> Result<Self> {
        let mirror = MetadataMirror::init(meta_dir.into()).await?;

        let tracker = Self {
            inner: Arc::new(TrackerInner {
                entries: RwLock::new(HashMap::new()),
                mirror,
                mirror_lock: Mutex::new(()),
                pending: Mutex::new(PendingMirror::default()),
                ttl,
                clock,
                observer,
            }),
        };

        let loaded = tracker.load_all().await;
        info!(
            meta_dir = ?tracker.meta_dir(),
            loaded,
            ttl_secs = ttl.as_secs(),
            "Access tracker initialized"
        );

        Ok(tracker)
    }

    pub fn meta_dir(&self) -> &Path {
        self.inner.mirror.root()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Record a read of `digest`. Creates the entry on first sight.
    ///
    /// Returns once the in-memory state is updated; the mirror write is
    /// scheduled, not awaited.
    pub async fn record_access(&self, digest: &Digest, size: u64) {
        let now = self.inner.clock.now();
        {
            let mut entries = self.inner.entries.write().await;
            entries
                .entry(digest.clone())
                .and_modify(|meta| {
                    // last_accessed never moves backwards
                    meta.last_accessed = meta.last_accessed.max(now);
                    meta.size = size;
                })
                .or_insert_with(|| BlobMeta::new(digest.clone(), size, now));
        }

        self.schedule_persist(digest).await;
        self.inner.observer.on_access(digest, size);
        debug!(digest = %digest, size, "Recorded blob access");
    }

    /// Record a committed write of `digest`. A write counts as an access.
    pub async fn record_write(&self, digest: &Digest, size: u64) {
        self.record_access(digest, size).await;
    }

    /// Digests whose last access is strictly older than `ttl`, oldest first.
    pub async fn expired_keys(&self, ttl: Duration) -> Vec<Digest> {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let now = self.inner.clock.now();

        let entries = self.inner.entries.read().await;
        let mut expired: Vec<&BlobMeta> = entries
            .values()
            .filter(|meta| now - meta.last_accessed > ttl)
            .collect();
        expired.sort_by_key(|meta| meta.last_accessed);

        debug!(
            expired = expired.len(),
            total = entries.len(),
            "Scanned for expired blobs"
        );
        expired.into_iter().map(|meta| meta.digest.clone()).collect()
    }

    /// Digests expired under the configured TTL.
    pub async fn expired(&self) -> Vec<Digest> {
        self.expired_keys(self.inner.ttl).await
    }

    /// Whether `digest` is tracked and expired under the configured TTL.
    pub async fn is_expired(&self, digest: &Digest) -> bool {
        let ttl = TimeDelta::from_std(self.inner.ttl).unwrap_or(TimeDelta::MAX);
        let now = self.inner.clock.now();
        self.inner
            .entries
            .read()
            .await
            .get(digest)
            .is_some_and(|meta| now - meta.last_accessed > ttl)
    }

    pub async fn get(&self, digest: &Digest) -> Option<BlobMeta> {
        self.inner.entries.read().await.get(digest).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop tracking `digest` and delete its mirror record.
    ///
    /// The in-memory entry is always dropped. If the record cannot be deleted
    /// the error is returned, the in-memory removal stands, and the deletion
    /// is retried by [`flush`](Self::flush).
    pub async fn remove(&self, digest: &Digest) -> Result<Option<BlobMeta>> {
        self.remove_where(digest, |_| true).await
    }

    /// Like [`remove`](Self::remove), but only if the entry's `last_accessed`
    /// still equals `last_accessed`.
    ///
    /// Returns `Ok(None)` and leaves the entry and its record alone when the
    /// blob was recorded again in the meantime. An untracked digest is
    /// handled exactly as by `remove`.
    pub async fn remove_if_unchanged(
        &self,
        digest: &Digest,
        last_accessed: DateTime<Utc>,
    ) -> Result<Option<BlobMeta>> {
        self.remove_where(digest, |meta| meta.last_accessed == last_accessed)
            .await
    }

    async fn remove_where<F>(&self, digest: &Digest, matches: F) -> Result<Option<BlobMeta>>
    where
        F: FnOnce(&BlobMeta) -> bool,
    {
        let (removed, outcome) = {
            let _mirror = self.inner.mirror_lock.lock().await;

            let removed = {
                let mut entries = self.inner.entries.write().await;
                match entries.get(digest) {
                    Some(meta) if !matches(meta) => {
                        debug!(digest = %digest, "Blob recorded again, keeping metadata");
                        return Ok(None);
                    }
                    _ => entries.remove(digest),
                }
            };
            let outcome = self.inner.mirror.delete(digest).await;

            let mut pending = self.inner.pending.lock().await;
            pending.dirty.remove(digest);
            pending.unsaved.remove(digest);
            if outcome.is_err() {
                pending.orphaned.insert(digest.clone());
            } else {
                pending.orphaned.remove(digest);
            }

            (removed, outcome)
        };

        if let Some(meta) = &removed {
            self.inner.observer.on_delete(digest, meta.size);
        }

        match outcome {
            Ok(()) => {
                debug!(digest = %digest, tracked = removed.is_some(), "Removed blob metadata");
                Ok(removed)
            }
            Err(e) => {
                warn!(digest = %digest, error = %e, "Failed to delete metadata record");
                Err(e)
            }
        }
    }

    /// Repopulate the in-memory map from the mirror. Returns the number of
    /// records merged. Unreadable records are skipped.
    pub async fn load_all(&self) -> usize {
        let _mirror = self.inner.mirror_lock.lock().await;
        let records = self.inner.mirror.load_all().await;
        let orphaned = self.inner.pending.lock().await.orphaned.clone();

        let mut entries = self.inner.entries.write().await;
        let mut loaded = 0;
        for meta in records {
            if orphaned.contains(&meta.digest) {
                continue;
            }
            loaded += 1;
            match entries.get_mut(&meta.digest) {
                Some(existing) if existing.last_accessed >= meta.last_accessed => {}
                Some(existing) => *existing = meta,
                None => {
                    entries.insert(meta.digest.clone(), meta);
                }
            }
        }

        debug!(loaded, total = entries.len(), "Loaded blob metadata");
        loaded
    }

    /// Persist every dirty or previously failed entry and retry deletion of
    /// orphaned records, waiting for the I/O to finish.
    ///
    /// Returns the first error encountered; every key is attempted.
    pub async fn flush(&self) -> Result<()> {
        let _mirror = self.inner.mirror_lock.lock().await;

        let (to_save, orphaned) = {
            let mut pending = self.inner.pending.lock().await;
            let mut to_save: HashSet<Digest> = pending.dirty.drain().collect();
            to_save.extend(pending.unsaved.drain());
            let orphaned: Vec<Digest> = pending.orphaned.drain().collect();
            (to_save, orphaned)
        };

        let mut first_error = None;

        for digest in to_save {
            let meta = self.inner.entries.read().await.get(&digest).cloned();
            let Some(meta) = meta else { continue };

            if let Err(e) = self.inner.mirror.save(&meta).await {
                warn!(digest = %digest, error = %e, "Failed to persist blob metadata");
                self.inner.pending.lock().await.unsaved.insert(digest);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        for digest in orphaned {
            if self.inner.entries.read().await.contains_key(&digest) {
                continue;
            }
            if let Err(e) = self.inner.mirror.delete(&digest).await {
                warn!(digest = %digest, error = %e, "Failed to delete orphaned metadata record");
                self.inner.pending.lock().await.orphaned.insert(digest);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn stats(&self) -> TrackerStats {
        let entries = self.inner.entries.read().await;
        TrackerStats {
            total_blobs: entries.len(),
            total_size: entries.values().map(|meta| meta.size).sum(),
            ttl_secs: self.inner.ttl.as_secs(),
        }
    }

    async fn schedule_persist(&self, digest: &Digest) {
        let newly_dirty = self.inner.pending.lock().await.dirty.insert(digest.clone());
        if newly_dirty {
            let inner = Arc::clone(&self.inner);
            let digest = digest.clone();
            tokio::spawn(async move { inner.persist(&digest).await });
        }
    }
}

impl TrackerInner {
    async fn persist(&self, digest: &Digest) {
        let _mirror = self.mirror_lock.lock().await;

        // Clear the mark before reading so any later update schedules another write.
        self.pending.lock().await.dirty.remove(digest);

        let meta = self.entries.read().await.get(digest).cloned();
        let Some(meta) = meta else { return };

        match self.mirror.save(&meta).await {
            Ok(()) => {
                let mut pending = self.pending.lock().await;
                pending.unsaved.remove(digest);
                pending.orphaned.remove(digest);
            }
            Err(e) => {
                warn!(digest = %digest, error = %e, "Failed to persist blob metadata");
                self.pending.lock().await.unsaved.insert(digest.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn digest(n: u8) -> Digest {
        Digest::parse(&format!("sha256:{:064x}", n)).unwrap()
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    async fn open(dir: &Path, clock: &ManualClock) -> AccessTracker {
        AccessTracker::open_with(dir, HOUR, Arc::new(clock.clone()), Arc::new(NoopObserver))
            .await
            .unwrap()
    }

    #[derive(Default)]
    struct RecordingObserver {
        accesses: StdMutex<Vec<(Digest, u64)>>,
        deletes: StdMutex<Vec<(Digest, u64)>>,
    }

    impl TrackingObserver for RecordingObserver {
        fn on_access(&self, digest: &Digest, size: u64) {
            self.accesses.lock().unwrap().push((digest.clone(), size));
        }

        fn on_delete(&self, digest: &Digest, size: u64) {
            self.deletes.lock().unwrap().push((digest.clone(), size));
        }
    }

    #[tokio::test]
    async fn test_first_access_sets_created_and_last_accessed() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 100).await;

        let meta = tracker.get(&digest(1)).await.unwrap();
        assert_eq!(meta.created_at, start());
        assert_eq!(meta.last_accessed, start());
        assert_eq!(meta.size, 100);
    }

    #[tokio::test]
    async fn test_later_access_bumps_last_accessed_only() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_write(&digest(1), 100).await;
        clock.advance(TimeDelta::minutes(5));
        tracker.record_access(&digest(1), 120).await;

        let meta = tracker.get(&digest(1)).await.unwrap();
        assert_eq!(meta.created_at, start());
        assert_eq!(meta.last_accessed, start() + TimeDelta::minutes(5));
        assert_eq!(meta.size, 120);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_accessed_never_moves_backwards() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        clock.advance(TimeDelta::hours(1));
        tracker.record_access(&digest(1), 10).await;
        clock.set(start());
        tracker.record_access(&digest(1), 10).await;

        let meta = tracker.get(&digest(1)).await.unwrap();
        assert_eq!(meta.last_accessed, start() + TimeDelta::hours(1));
    }

    #[tokio::test]
    async fn test_expiry_is_strict() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 10).await;

        clock.advance(TimeDelta::hours(1));
        assert!(tracker.expired_keys(HOUR).await.is_empty());

        assert!(!tracker.is_expired(&digest(1)).await);

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(tracker.expired_keys(HOUR).await, vec![digest(1)]);
        assert_eq!(tracker.expired().await, vec![digest(1)]);
        assert!(tracker.is_expired(&digest(1)).await);
        assert!(!tracker.is_expired(&digest(2)).await);
    }

    #[tokio::test]
    async fn test_access_resets_expiry() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 10).await;
        tracker.record_access(&digest(2), 10).await;
        clock.advance(TimeDelta::hours(2));
        tracker.record_access(&digest(2), 10).await;

        assert_eq!(tracker.expired_keys(HOUR).await, vec![digest(1)]);
    }

    #[tokio::test]
    async fn test_expired_keys_oldest_first() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(2), 10).await;
        clock.advance(TimeDelta::minutes(1));
        tracker.record_access(&digest(1), 10).await;
        clock.advance(TimeDelta::hours(3));

        assert_eq!(
            tracker.expired_keys(HOUR).await,
            vec![digest(2), digest(1)]
        );
    }

    #[tokio::test]
    async fn test_untracked_key_is_never_expired() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        clock.advance(TimeDelta::days(365));
        assert!(tracker.expired_keys(HOUR).await.is_empty());
        assert!(tracker.get(&digest(9)).await.is_none());
    }

    #[tokio::test]
    async fn test_flush_then_reopen_restores_entries() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 100).await;
        clock.advance(TimeDelta::seconds(30));
        tracker.record_write(&digest(2), 200).await;
        tracker.flush().await.unwrap();

        let original_1 = tracker.get(&digest(1)).await.unwrap();
        let original_2 = tracker.get(&digest(2)).await.unwrap();

        let reopened = open(dir.path(), &clock).await;
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.get(&digest(1)).await.unwrap(), original_1);
        assert_eq!(reopened.get(&digest(2)).await.unwrap(), original_2);
    }

    #[tokio::test]
    async fn test_mirror_reflects_latest_update_after_burst() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        for i in 0..50u64 {
            clock.advance(TimeDelta::seconds(1));
            tracker.record_access(&digest(1), i).await;
        }
        tracker.flush().await.unwrap();

        let latest = tracker.get(&digest(1)).await.unwrap();
        let reopened = open(dir.path(), &clock).await;
        assert_eq!(reopened.get(&digest(1)).await.unwrap(), latest);
    }

    #[tokio::test]
    async fn test_remove_deletes_entry_and_mirror() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 100).await;
        tracker.flush().await.unwrap();

        let removed = tracker.remove(&digest(1)).await.unwrap();
        assert_eq!(removed.map(|m| m.size), Some(100));
        assert!(tracker.get(&digest(1)).await.is_none());

        assert_eq!(tracker.load_all().await, 0);
        assert!(tracker.get(&digest(1)).await.is_none());

        let reopened = open(dir.path(), &clock).await;
        assert!(reopened.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_before_persist_runs_does_not_resurrect() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        // The persistence task for this access may not have run yet.
        tracker.record_access(&digest(1), 100).await;
        tracker.remove(&digest(1)).await.unwrap();
        tracker.flush().await.unwrap();

        // Give any already spawned task a chance to run.
        tokio::task::yield_now().await;
        let _ = tracker.flush().await;

        let reopened = open(dir.path(), &clock).await;
        assert!(reopened.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_untracked_is_ok() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        assert!(tracker.remove(&digest(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        assert_eq!(
            tracker.stats().await,
            TrackerStats {
                total_blobs: 0,
                total_size: 0,
                ttl_secs: 3600
            }
        );

        tracker.record_access(&digest(1), 100).await;
        tracker.record_access(&digest(2), 250).await;

        let stats = tracker.stats().await;
        assert_eq!(stats.total_blobs, 2);
        assert_eq!(stats.total_size, 350);
    }

    #[tokio::test]
    async fn test_observer_notified() {
        let dir = tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let tracker = AccessTracker::open_with(
            dir.path(),
            HOUR,
            Arc::new(SystemClock),
            observer.clone(),
        )
        .await
        .unwrap();

        tracker.record_access(&digest(1), 100).await;
        tracker.remove(&digest(1)).await.unwrap();
        tracker.remove(&digest(1)).await.unwrap();

        assert_eq!(*observer.accesses.lock().unwrap(), vec![(digest(1), 100)]);
        assert_eq!(*observer.deletes.lock().unwrap(), vec![(digest(1), 100)]);
    }

    /// Hands out the given instants in order, then repeats the last one.
    struct SequenceClock {
        times: StdMutex<Vec<DateTime<Utc>>>,
    }

    impl Clock for SequenceClock {
        fn now(&self) -> DateTime<Utc> {
            let mut times = self.times.lock().unwrap();
            if times.len() > 1 {
                times.remove(0)
            } else {
                times[0]
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_accesses_keep_latest_time() {
        let dir = tempdir().unwrap();
        let t1 = start();
        let t2 = start() + TimeDelta::seconds(5);
        let clock = Arc::new(SequenceClock {
            times: StdMutex::new(vec![t1, t2]),
        });
        let tracker = AccessTracker::open_with(dir.path(), HOUR, clock, Arc::new(NoopObserver))
            .await
            .unwrap();

        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let tracker = tracker.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tracker.record_access(&digest(0xbb), 100).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whichever call landed last, the later timestamp wins.
        let meta = tracker.get(&digest(0xbb)).await.unwrap();
        assert_eq!(tracker.len().await, 1);
        assert_eq!(meta.last_accessed, t2);
        assert!(meta.created_at <= meta.last_accessed);
        assert_eq!(meta.size, 100);
    }

    #[tokio::test]
    async fn test_concurrent_accesses_keep_single_entry() {
        let dir = tempdir().unwrap();
        let tracker = AccessTracker::open(dir.path(), HOUR).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.record_access(&digest(1), 100 + i).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tracker.len().await, 1);
        let size = tracker.get(&digest(1)).await.unwrap().size;
        assert!((100..116).contains(&size));
    }

    #[tokio::test]
    async fn test_remove_if_unchanged_keeps_refreshed_entry() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(1), 100).await;
        let seen = tracker.get(&digest(1)).await.unwrap();

        clock.advance(TimeDelta::seconds(1));
        tracker.record_write(&digest(1), 120).await;
        tracker.flush().await.unwrap();

        let removed = tracker
            .remove_if_unchanged(&digest(1), seen.last_accessed)
            .await
            .unwrap();
        assert!(removed.is_none());
        assert_eq!(tracker.get(&digest(1)).await.unwrap().size, 120);

        let reopened = open(dir.path(), &clock).await;
        assert_eq!(reopened.get(&digest(1)).await.unwrap().size, 120);
    }

    #[tokio::test]
    async fn test_remove_if_unchanged_removes_untouched_entry() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(start());
        let tracker = open(dir.path(), &clock).await;

        tracker.record_access(&digest(2), 64).await;
        tracker.flush().await.unwrap();
        let seen = tracker.get(&digest(2)).await.unwrap();

        let removed = tracker
            .remove_if_unchanged(&digest(2), seen.last_accessed)
            .await
            .unwrap();
        assert_eq!(removed, Some(seen));
        assert!(tracker.is_empty().await);

        let reopened = open(dir.path(), &clock).await;
        assert!(reopened.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_fails_when_meta_dir_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("meta");
        tokio::fs::write(&file, b"x").await.unwrap();

        let result = AccessTracker::open(&file, HOUR).await;
        assert!(matches!(
            result,
            Err(crate::error::TrackerError::MetadataDir { .. })
        ));
    }
}
