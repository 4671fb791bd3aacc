//! Tracking types

use crate::digest::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access metadata for one tracked blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub digest: Digest,
    pub last_accessed: DateTime<Utc>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl BlobMeta {
    pub fn new(digest: Digest, size: u64, now: DateTime<Utc>) -> Self {
        Self {
            digest,
            last_accessed: now,
            size,
            created_at: now,
        }
    }
}

/// Aggregate view of the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub total_blobs: usize,
    pub total_size: u64,
    pub ttl_secs: u64,
}

/// Outcome of a single cleanup cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
}
