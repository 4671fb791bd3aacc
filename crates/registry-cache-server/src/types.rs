//! Core types for the registry cache server

use blob_access_tracker::TrackerStats;
use serde::Serialize;
use std::path::PathBuf;

/// Configuration for the registry cache server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub storage_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub max_upload_size: usize,
}

impl ServerConfig {
    /// Root of blob content on disk
    pub fn data_dir(&self) -> PathBuf {
        self.storage_dir.join("data")
    }

    /// Root of the access metadata mirror
    pub fn meta_dir(&self) -> PathBuf {
        self.storage_dir.join("meta").join("cache")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            storage_dir: PathBuf::from("/var/cache/registry-cache"),
            cache_ttl_secs: 30 * 24 * 60 * 60, // 30 days
            cleanup_interval_secs: 60 * 60,    // 1 hour
            max_upload_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cleanup_running: bool,
    pub tracker: TrackerStats,
}

/// Result of an out-of-band blob removal
#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub digest: String,
    pub content_deleted: bool,
    pub was_tracked: bool,
}
