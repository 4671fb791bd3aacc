//! Periodic deletion of expired blobs
//!
//! Each cycle flushes pending metadata, asks the tracker for expired digests,
//! and hands each one to a [`BlobDeleter`] supplied by the owning server.
//! Successful deletions drop the tracker entry; failures leave it in place so
//! the next cycle retries. Shutdown, whether from [`CleanupScheduler::stop`]
//! or from an owner-supplied signal, is observed between ticks and between
//! digests, never in the middle of a deletion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::digest::Digest;
use crate::error::DeleteError;
use crate::tracker::AccessTracker;
use crate::types::CleanupReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The content was not present. Treated as a successful deletion.
    AlreadyGone,
}

/// Deletes blob content on behalf of the scheduler.
///
/// Must be idempotent. Content that is already absent should be reported as
/// [`DeleteOutcome::AlreadyGone`] rather than as an error, otherwise the
/// digest is retried every cycle.
#[async_trait]
pub trait BlobDeleter: Send + Sync {
    async fn delete(&self, digest: &Digest) -> Result<DeleteOutcome, DeleteError>;
}

pub struct CleanupScheduler {
    tracker: AccessTracker,
    deleter: Arc<dyn BlobDeleter>,
    interval: Duration,
    cycle: Mutex<()>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    external: Option<watch::Receiver<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the running flag when a cycle ends, including on cancellation.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Resolves once the owner's signal is `true`. Pending forever without one.
async fn cancelled(external: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = external {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

impl CleanupScheduler {
    pub fn new(
        tracker: AccessTracker,
        deleter: Arc<dyn BlobDeleter>,
        interval: Duration,
    ) -> Arc<Self> {
        Self::build(tracker, deleter, interval, None)
    }

    /// Like [`new`](Self::new), but also stops once `shutdown` turns `true`.
    ///
    /// The loop exits without waiting for the next tick and an in-flight
    /// cycle ends after the digest it is deleting. Dropping the sender
    /// without sending `true` never cancels.
    pub fn with_shutdown(
        tracker: AccessTracker,
        deleter: Arc<dyn BlobDeleter>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Self::build(tracker, deleter, interval, Some(shutdown))
    }

    fn build(
        tracker: AccessTracker,
        deleter: Arc<dyn BlobDeleter>,
        interval: Duration,
        external: Option<watch::Receiver<bool>>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            tracker,
            deleter,
            interval,
            cycle: Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown_tx,
            external,
            task: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a cycle is in progress right now.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow() || self.external.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Spawn the tick loop. The first cycle runs one interval from now.
    ///
    /// Calling this on a started or stopped scheduler does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() || self.is_stopped() {
            warn!("Cleanup scheduler already started or stopped");
            return;
        }

        let shutdown = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(Arc::clone(self).run_loop(shutdown)));
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.tracker.ttl().as_secs(),
            "Starting blob cleanup"
        );

        loop {
            if self.is_stopped() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = cancelled(self.external.clone()) => {
                    info!("Cleanup cancelled by owner");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!("Blob cleanup stopped");
    }

    /// Run one cycle now. Waits for any cycle already in progress first.
    pub async fn run_once(&self) -> CleanupReport {
        let _cycle = self.cycle.lock().await;
        if self.is_stopped() {
            debug!("Cleanup scheduler stopped, skipping cycle");
            return CleanupReport::default();
        }

        self.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> CleanupReport {
        info!("Running blob cleanup");

        if let Err(e) = self.tracker.flush().await {
            warn!(error = %e, "Failed to flush blob metadata before cleanup");
        }

        let expired = self.tracker.expired().await;
        let mut report = CleanupReport {
            expired: expired.len(),
            ..Default::default()
        };

        if expired.is_empty() {
            debug!("No expired blobs to clean up");
            return report;
        }
        info!(expired = expired.len(), "Found expired blobs");

        for digest in expired {
            if self.is_stopped() {
                info!("Cleanup interrupted by shutdown");
                break;
            }

            // Accessed since the scan.
            if !self.tracker.is_expired(&digest).await {
                debug!(digest = %digest, "Blob accessed since scan, keeping");
                continue;
            }
            let Some(seen) = self.tracker.get(&digest).await else {
                continue;
            };

            let outcome = match self.deleter.delete(&digest).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    report.failed += 1;
                    error!(digest = %digest, error = %e, "Failed to delete blob");
                    continue;
                }
            };

            // A read or upload that landed during the delete keeps its entry.
            match self
                .tracker
                .remove_if_unchanged(&digest, seen.last_accessed)
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(digest = %digest, "Blob metadata changed during deletion, not removed");
                }
                Err(e) => {
                    error!(digest = %digest, error = %e, "Failed to remove blob metadata");
                }
            }

            let size = seen.size;
            report.deleted += 1;
            report.bytes_freed += size;
            debug!(digest = %digest, ?outcome, size, "Deleted expired blob");
        }

        info!(
            deleted = report.deleted,
            failed = report.failed,
            bytes_freed = report.bytes_freed,
            "Cleanup completed"
        );
        report
    }

    /// Stop the scheduler and wait for any in-flight cycle to finish.
    ///
    /// Further ticks and manual cycles are refused. Safe to call more than once.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Cleanup task failed");
            }
        }

        // A manually triggered cycle may still be running.
        let _cycle = self.cycle.lock().await;
    }
}
