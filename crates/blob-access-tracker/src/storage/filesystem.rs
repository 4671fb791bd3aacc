//! Local filesystem storage backend

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::{BlobReader, FileInfo, FileWriter, StorageDriver};
use crate::error::{StorageError, StorageResult};

/// Storage rooted at a local directory.
///
/// A store path `/a/b/c` maps to `{root}/a/b/c`. `.` and `..` segments are
/// rejected.
pub struct FilesystemDriver {
    root: PathBuf,
}

impl FilesystemDriver {
    /// Create storage at the given root directory, creating it if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        if !path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
            full.push(segment);
        }
        Ok(full)
    }
}

fn map_io(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

async fn ensure_parent(full: &Path) -> StorageResult<()> {
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl StorageDriver for FilesystemDriver {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn get_content(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.full_path(path)?;
        fs::read(&full).await.map_err(|e| map_io(path, e))
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        let full = self.full_path(path)?;
        ensure_parent(&full).await?;
        fs::write(&full, content).await?;
        Ok(())
    }

    async fn reader(&self, path: &str, offset: u64) -> StorageResult<BlobReader> {
        let full = self.full_path(path)?;
        let mut file = File::open(&full).await.map_err(|e| map_io(path, e))?;

        let len = file.metadata().await?.len();
        if offset > len {
            return Err(StorageError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }

        Ok(Box::new(file))
    }

    async fn writer(&self, path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>> {
        let full = self.full_path(path)?;
        ensure_parent(&full).await?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&full)
            .await?;
        let size = if append { file.metadata().await?.len() } else { 0 };

        Ok(Box::new(FsFileWriter {
            path: path.to_string(),
            full,
            file: Some(file),
            size,
            state: WriterState::Open,
        }))
    }

    async fn stat(&self, path: &str) -> StorageResult<FileInfo> {
        let full = self.full_path(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| map_io(path, e))?;
        Ok(FileInfo {
            path: path.to_string(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            is_dir: meta.is_dir(),
        })
    }

    async fn move_path(&self, source: &str, dest: &str) -> StorageResult<()> {
        let from = self.full_path(source)?;
        let to = self.full_path(dest)?;

        fs::metadata(&from).await.map_err(|e| map_io(source, e))?;
        ensure_parent(&to).await?;
        fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.full_path(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| map_io(path, e))?;

        let result = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        result.map_err(|e| map_io(path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Committed,
    Cancelled,
    Closed,
}

struct FsFileWriter {
    path: String,
    full: PathBuf,
    file: Option<File>,
    size: u64,
    state: WriterState,
}

impl FsFileWriter {
    fn open_file(&mut self) -> StorageResult<&mut File> {
        if self.state != WriterState::Open {
            return Err(StorageError::Backend(format!(
                "writer for {} is {:?}",
                self.path, self.state
            )));
        }
        self.file
            .as_mut()
            .ok_or_else(|| StorageError::Backend(format!("writer for {} has no file", self.path)))
    }
}

#[async_trait]
impl FileWriter for FsFileWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        let file = self.open_file()?;
        file.write_all(data).await?;
        self.size += data.len() as u64;
        Ok(data.len())
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn commit(&mut self) -> StorageResult<()> {
        let file = self.open_file()?;
        file.flush().await?;
        file.sync_all().await?;
        self.state = WriterState::Committed;
        Ok(())
    }

    async fn cancel(&mut self) -> StorageResult<()> {
        self.open_file()?;
        self.file = None;
        self.state = WriterState::Cancelled;
        match fs::remove_file(&self.full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> StorageResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        if self.state == WriterState::Open {
            self.state = WriterState::Closed;
        }
        Ok(())
    }
}
