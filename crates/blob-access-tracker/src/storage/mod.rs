//! The content store contract consumed by the tracking layer
//!
//! Paths are absolute, `/`-separated strings such as
//! `/docker/registry/v2/blobs/sha256/ab/ab12.../data`.
//!
//! ## Backends
//!
//! | Backend            | Use Case            |
//! |--------------------|---------------------|
//! | `InMemoryDriver`   | Unit tests          |
//! | `FilesystemDriver` | Production, local   |

use crate::error::StorageResult;
use async_trait::async_trait;
use tokio::io::AsyncRead;

mod filesystem;
mod memory;

pub use filesystem::FilesystemDriver;
pub use memory::InMemoryDriver;

/// Streaming reader returned by [`StorageDriver::reader`].
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// An open write handle. Content written is only final after `commit`.
#[async_trait]
pub trait FileWriter: Send {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize>;

    /// Bytes written so far, including any pre-existing content when appending.
    fn size(&self) -> u64;

    /// Flush and finalize the written content.
    async fn commit(&mut self) -> StorageResult<()>;

    /// Abandon the write and remove partial content.
    async fn cancel(&mut self) -> StorageResult<()>;

    /// Release the handle. Uncommitted content stays in place for resumption.
    async fn close(&mut self) -> StorageResult<()>;
}

#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_content(&self, path: &str) -> StorageResult<Vec<u8>>;

    async fn put_content(&self, path: &str, content: &[u8]) -> StorageResult<()>;

    async fn reader(&self, path: &str, offset: u64) -> StorageResult<BlobReader>;

    async fn writer(&self, path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>>;

    async fn stat(&self, path: &str) -> StorageResult<FileInfo>;

    async fn move_path(&self, source: &str, dest: &str) -> StorageResult<()>;

    /// Delete a file or a whole directory tree.
    async fn delete(&self, path: &str) -> StorageResult<()>;
}
