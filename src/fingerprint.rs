//! Two-tier file fingerprinting.
//!
//! A previously recorded `(mtime, size)` pair short-circuits re-hashing
//! unchanged trees; any metadata change forces a content hash. A content
//! change that preserves both mtime and size goes undetected, which is an
//! accepted risk of the metadata tier. Hashing runs on the rayon pool and the
//! result set is keyed by path, so worker completion order never reaches the
//! cache key.
use crate::paths::RootedPath;
use crate::util::{sha256_file, sha256_hex};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Recorded fingerprint for one file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileFingerprint {
    pub mtime_ms: u64,
    pub size: u64,
    pub sha256: String,
}

pub type FingerprintSet = BTreeMap<String, FileFingerprint>;

fn stat(path: &Path) -> Result<(u64, u64)> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let mtime_ms = metadata
        .modified()
        .with_context(|| format!("mtime of {}", path.display()))?
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    Ok((mtime_ms, metadata.len()))
}

/// Fingerprint every target, reusing recorded hashes where `(mtime, size)` is
/// unchanged. Output is keyed by canonical relative path.
pub fn fingerprint_files(
    targets: &[RootedPath],
    previous: &FingerprintSet,
) -> Result<FingerprintSet> {
    let entries: Vec<(String, FileFingerprint)> = targets
        .par_iter()
        .map(|target| {
            let (mtime_ms, size) = stat(target.abs())?;
            if let Some(recorded) = previous.get(target.rel()) {
                if recorded.mtime_ms == mtime_ms && recorded.size == size {
                    return Ok((target.rel().to_string(), recorded.clone()));
                }
            }
            let sha256 = sha256_file(target.abs())?;
            Ok((
                target.rel().to_string(),
                FileFingerprint {
                    mtime_ms,
                    size,
                    sha256,
                },
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(entries.into_iter().collect())
}

/// Fingerprint engine-declared config files (absolute paths). A missing
/// config file contributes a sentinel so presence changes invalidate keys.
pub fn fingerprint_configs(paths: &[std::path::PathBuf]) -> FingerprintSet {
    let mut set = FingerprintSet::new();
    for path in paths {
        let fingerprint = match stat(path) {
            Ok((mtime_ms, size)) => match sha256_file(path) {
                Ok(sha256) => FileFingerprint {
                    mtime_ms,
                    size,
                    sha256,
                },
                Err(_) => missing_sentinel(),
            },
            Err(_) => missing_sentinel(),
        };
        set.insert(path.display().to_string(), fingerprint);
    }
    set
}

fn missing_sentinel() -> FileFingerprint {
    FileFingerprint {
        mtime_ms: 0,
        size: 0,
        sha256: sha256_hex(b"absent"),
    }
}
