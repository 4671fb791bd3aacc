//! On-disk mirror of tracked metadata
//!
//! One JSON file per digest, sharded by the first two and next two characters
//! of the key: `<root>/sh/a2/sha256:<hex>.json`.

use crate::digest::Digest;
use crate::error::{Result, TrackerError};
use crate::types::BlobMeta;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const META_EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "json.tmp";

pub(crate) struct MetadataMirror {
    root: PathBuf,
}

impl MetadataMirror {
    /// Ensure the mirror root exists. Failure here is fatal for the tracker.
    pub async fn init(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|source| TrackerError::MetadataDir {
                path: root.clone(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, digest: &Digest) -> PathBuf {
        let key = digest.as_str();
        let file = format!("{}.{}", key, META_EXTENSION);
        if key.len() > 10 {
            self.root.join(&key[..2]).join(&key[2..4]).join(file)
        } else {
            self.root.join(file)
        }
    }

    /// Write a record atomically (temp file + rename).
    pub async fn save(&self, meta: &BlobMeta) -> Result<()> {
        let path = self.path_for(&meta.digest);
        let data = serde_json::to_vec_pretty(meta).map_err(|source| TrackerError::Encode {
            digest: meta.digest.clone(),
            source,
        })?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(|source| TrackerError::Mirror {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let tmp = path.with_extension(TMP_EXTENSION);
        fs::write(&tmp, &data)
            .await
            .map_err(|source| TrackerError::Mirror {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| TrackerError::Mirror {
                path: path.clone(),
                source,
            })?;

        debug!(digest = %meta.digest, path = ?path, "Persisted blob metadata");
        Ok(())
    }

    /// Delete a record. A record that is already gone is not an error.
    pub async fn delete(&self, digest: &Digest) -> Result<()> {
        let path = self.path_for(digest);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TrackerError::Mirror { path, source }),
        }
    }

    /// Read every record under the root. Bad entries are skipped with a warning.
    pub async fn load_all(&self) -> Vec<BlobMeta> {
        let mut records = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = ?dir, error = %e, "Failed to read metadata directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = ?dir, error = %e, "Failed to list metadata directory");
                        break;
                    }
                };

                let path = entry.path();
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => pending.push(path),
                    Ok(ft) if ft.is_file() => {
                        if path.extension().and_then(|e| e.to_str()) != Some(META_EXTENSION) {
                            continue;
                        }
                        if let Some(meta) = read_record(&path).await {
                            records.push(meta);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(path = ?path, error = %e, "Failed to stat metadata entry"),
                }
            }
        }

        records
    }
}

async fn read_record(path: &Path) -> Option<BlobMeta> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read metadata file");
            return None;
        }
    };

    match serde_json::from_slice::<BlobMeta>(&data) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to parse metadata file");
            None
        }
    }
}
