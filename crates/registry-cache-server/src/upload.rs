//! Verified blob uploads
//!
//! Content is staged under `_uploads`, hashed while it is written, committed
//! only when the hash matches the claimed digest, then moved into the blob
//! tree. The move is what the tracking layer records.

use crate::error::{Result, ServerError};
use blob_access_tracker::{blob_data_path, Digest, FileWriter, StorageDriver};
use sha2::{Digest as _, Sha256, Sha384, Sha512};
use tracing::{debug, warn};

const WRITE_CHUNK: usize = 64 * 1024;

enum ContentHasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl ContentHasher {
    fn for_digest(digest: &Digest) -> Self {
        match digest.algorithm() {
            "sha384" => ContentHasher::Sha384(Sha384::new()),
            "sha512" => ContentHasher::Sha512(Sha512::new()),
            _ => ContentHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha256(h) => h.update(data),
            ContentHasher::Sha384(h) => h.update(data),
            ContentHasher::Sha512(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            ContentHasher::Sha256(h) => format!("sha256:{}", hex::encode(h.finalize())),
            ContentHasher::Sha384(h) => format!("sha384:{}", hex::encode(h.finalize())),
            ContentHasher::Sha512(h) => format!("sha512:{}", hex::encode(h.finalize())),
        }
    }
}

/// Stage `data` at `upload_path`, verify it against `digest` and move it to
/// the blob's data path. Returns the stored size.
///
/// On any failure the staged content is cancelled and nothing is moved.
pub async fn store_blob(
    driver: &dyn StorageDriver,
    digest: &Digest,
    data: &[u8],
    upload_path: &str,
) -> Result<u64> {
    let mut writer = driver.writer(upload_path, false).await?;

    if let Err(e) = stage(writer.as_mut(), digest, data).await {
        if let Err(cancel_err) = writer.cancel().await {
            warn!(path = %upload_path, error = %cancel_err, "Failed to cancel upload");
        }
        return Err(e);
    }
    let size = writer.size();

    driver.move_path(upload_path, &blob_data_path(digest)).await?;

    debug!(digest = %digest, size, "Stored blob");
    Ok(size)
}

async fn stage(writer: &mut dyn FileWriter, digest: &Digest, data: &[u8]) -> Result<()> {
    let mut hasher = ContentHasher::for_digest(digest);

    for chunk in data.chunks(WRITE_CHUNK) {
        writer.write(chunk).await?;
        hasher.update(chunk);
    }

    let actual = hasher.finish();
    if actual != digest.as_str() {
        return Err(ServerError::DigestMismatch {
            expected: digest.to_string(),
            actual,
        });
    }

    writer.commit().await?;
    Ok(())
}
