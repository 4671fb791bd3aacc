//! Observability hooks fired after tracker operations succeed

use crate::digest::Digest;

/// Receives tracking notifications. Both methods default to no-ops.
///
/// Called inline on the request path, so implementations should be cheap.
pub trait TrackingObserver: Send + Sync {
    fn on_access(&self, _digest: &Digest, _size: u64) {}

    fn on_delete(&self, _digest: &Digest, _size: u64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrackingObserver for NoopObserver {}
