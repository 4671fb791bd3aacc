//! Content digests and blob path recognition
//!
//! Blob content lives at `<root>/blobs/<algorithm>/<xx>/<hex>/data`, where
//! `xx` is the first two characters of the hex digest. Only paths of that
//! shape identify trackable content; uploads, manifests and link files do not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Root of the registry storage tree inside the wrapped store.
pub const REGISTRY_ROOT: &str = "/docker/registry/v2";

const BLOBS_SEGMENT: &str = "blobs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestParseError {
    #[error("missing algorithm separator in {0:?}")]
    MissingSeparator(String),

    #[error("unsupported digest algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("invalid {algorithm} hex: expected {expected} lowercase hex characters")]
    InvalidHex {
        algorithm: String,
        expected: usize,
    },
}

/// Canonical content key: `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn parse(s: &str) -> Result<Self, DigestParseError> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| DigestParseError::MissingSeparator(s.to_string()))?;

        let expected = hex_len(algorithm)
            .ok_or_else(|| DigestParseError::UnsupportedAlgorithm(algorithm.to_string()))?;

        let valid = hex.len() == expected
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(DigestParseError::InvalidHex {
                algorithm: algorithm.to_string(),
                expected,
            });
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or_default()
    }

    pub fn hex(&self) -> &str {
        self.0.split_once(':').map(|(_, h)| h).unwrap_or_default()
    }
}

fn hex_len(algorithm: &str) -> Option<usize> {
    match algorithm {
        "sha256" => Some(64),
        "sha384" => Some(96),
        "sha512" => Some(128),
        _ => None,
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// Extract the content digest addressed by a storage path.
///
/// Returns `None` for anything that is not blob content, including short or
/// malformed paths.
pub fn extract_digest(path: &str) -> Option<Digest> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    parts
        .iter()
        .enumerate()
        .filter(|(_, part)| **part == BLOBS_SEGMENT)
        .find_map(|(i, _)| {
            let algorithm = parts.get(i + 1)?;
            let shard = parts.get(i + 2)?;
            let hex = parts.get(i + 3)?;

            if shard.len() != 2 || !hex.starts_with(shard) {
                return None;
            }

            Digest::parse(&format!("{}:{}", algorithm, hex)).ok()
        })
}

/// Directory holding a blob's content within the registry tree.
pub fn blob_dir_path(digest: &Digest) -> String {
    let hex = digest.hex();
    format!(
        "{}/{}/{}/{}/{}",
        REGISTRY_ROOT,
        BLOBS_SEGMENT,
        digest.algorithm(),
        &hex[..2],
        hex
    )
}

/// Path of a blob's content file within the registry tree.
pub fn blob_data_path(digest: &Digest) -> String {
    format!("{}/data", blob_dir_path(digest))
}
