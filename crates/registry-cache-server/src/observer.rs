//! Tracking notifications routed to the log

use blob_access_tracker::{Digest, TrackingObserver};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl TrackingObserver for LoggingObserver {
    fn on_access(&self, digest: &Digest, size: u64) {
        debug!(digest = %digest, size, "Blob accessed");
    }

    fn on_delete(&self, digest: &Digest, size: u64) {
        info!(digest = %digest, size, "Blob evicted");
    }
}
