//! In-memory storage backend (for testing)

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{BlobReader, FileInfo, FileWriter, StorageDriver};
use crate::error::{StorageError, StorageResult};

type Files = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// In-memory storage for unit tests
///
/// Directories are implicit: a path is a directory when files exist beneath
/// it. Writes are visible as they happen, like on a real filesystem.
#[derive(Default, Clone)]
pub struct InMemoryDriver {
    files: Files,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        read_files(&self.files).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        read_files(&self.files).contains_key(&normalize(path))
    }
}

fn read_files(files: &Files) -> RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
    files.read().unwrap_or_else(|e| e.into_inner())
}

fn write_files(files: &Files) -> RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>> {
    files.write().unwrap_or_else(|e| e.into_inner())
}

fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn children<'a>(
    files: &'a BTreeMap<String, Vec<u8>>,
    dir: &str,
) -> impl Iterator<Item = &'a String> + 'a {
    let prefix = if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    };
    files.keys().filter(move |k| k.starts_with(&prefix))
}

#[async_trait]
impl StorageDriver for InMemoryDriver {
    fn name(&self) -> &'static str {
        "inmemory"
    }

    async fn get_content(&self, path: &str) -> StorageResult<Vec<u8>> {
        read_files(&self.files)
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> StorageResult<()> {
        write_files(&self.files).insert(normalize(path), content.to_vec());
        Ok(())
    }

    async fn reader(&self, path: &str, offset: u64) -> StorageResult<BlobReader> {
        let content = self.get_content(path).await?;
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start <= content.len())
            .ok_or_else(|| StorageError::InvalidOffset {
                path: path.to_string(),
                offset,
            })?;
        Ok(Box::new(Cursor::new(content[start..].to_vec())))
    }

    async fn writer(&self, path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>> {
        let key = normalize(path);
        let size = {
            let mut files = write_files(&self.files);
            let existing = files.entry(key.clone()).or_default();
            if !append {
                existing.clear();
            }
            existing.len() as u64
        };

        Ok(Box::new(InMemoryWriter {
            files: Arc::clone(&self.files),
            key,
            size,
            open: true,
        }))
    }

    async fn stat(&self, path: &str) -> StorageResult<FileInfo> {
        let key = normalize(path);
        let files = read_files(&self.files);

        if let Some(content) = files.get(&key) {
            return Ok(FileInfo {
                path: path.to_string(),
                size: content.len() as u64,
                is_dir: false,
            });
        }
        if children(&files, &key).next().is_some() {
            return Ok(FileInfo {
                path: path.to_string(),
                size: 0,
                is_dir: true,
            });
        }
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn move_path(&self, source: &str, dest: &str) -> StorageResult<()> {
        let from = normalize(source);
        let to = normalize(dest);
        let mut files = write_files(&self.files);

        if let Some(content) = files.remove(&from) {
            files.insert(to, content);
            return Ok(());
        }

        let moved: Vec<String> = children(&files, &from).cloned().collect();
        if moved.is_empty() {
            return Err(StorageError::NotFound(source.to_string()));
        }
        for key in moved {
            if let Some(content) = files.remove(&key) {
                let suffix = &key[from.len()..];
                files.insert(format!("{}{}", to, suffix), content);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let key = normalize(path);
        let mut files = write_files(&self.files);

        let mut doomed: Vec<String> = children(&files, &key).cloned().collect();
        if files.contains_key(&key) {
            doomed.push(key);
        }
        if doomed.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        for key in doomed {
            files.remove(&key);
        }
        Ok(())
    }
}

struct InMemoryWriter {
    files: Files,
    key: String,
    size: u64,
    open: bool,
}

impl InMemoryWriter {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::Backend(format!("writer for {} is closed", self.key)))
        }
    }
}

#[async_trait]
impl FileWriter for InMemoryWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        self.ensure_open()?;
        write_files(&self.files)
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(data);
        self.size += data.len() as u64;
        Ok(data.len())
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    async fn cancel(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.open = false;
        write_files(&self.files).remove(&self.key);
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.open = false;
        Ok(())
    }
}
