//! Content-addressed cache for engine results.
//!
//! Keys hash the canonical plan representation, the recorded tool version,
//! and the fingerprint of every input file, so unchanged trees never
//! re-invoke an external tool and tool upgrades invalidate all prior entries.
//! Writes are tmp-file + rename so a concurrent reader never observes a
//! half-written entry; read failures of any kind degrade to a miss.
use crate::engine::Diagnostic;
use crate::fingerprint::FingerprintSet;
use crate::paths::Mode;
use crate::util::sha256_hex;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_ENTRY_SCHEMA_VERSION: u32 = 1;

/// One stored engine result. Created on a miss, read-only afterward; a newer
/// result for the same key replaces the file wholesale.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheEntry {
    pub schema_version: u32,
    pub key: String,
    pub engine_id: String,
    pub mode: Mode,
    pub diagnostics: Vec<Diagnostic>,
    pub exit_code: Option<i32>,
    pub command_fingerprint: String,
    pub file_fingerprints: FingerprintSet,
    pub tool_version: String,
    pub created_at_epoch_ms: u64,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    engine_id: &'a str,
    mode: Mode,
    command: &'a [String],
    tool_version: &'a str,
    config_fingerprints: &'a FingerprintSet,
    file_fingerprints: &'a FingerprintSet,
}

/// Derive the cache key for one scheduled invocation. All maps are keyed by
/// path, so serialization order is stable regardless of how fingerprints were
/// produced.
pub fn derive_key(
    engine_id: &str,
    mode: Mode,
    command: &[String],
    tool_version: &str,
    config_fingerprints: &FingerprintSet,
    file_fingerprints: &FingerprintSet,
) -> String {
    let material = KeyMaterial {
        engine_id,
        mode,
        command,
        tool_version,
        config_fingerprints,
        file_fingerprints,
    };
    // BTreeMap serialization is deterministic; a failure here would be a
    // programming error, so fall back to an uncacheable unique-ish key.
    match serde_json::to_vec(&material) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => sha256_hex(format!("{engine_id}/{}", mode.as_str()).as_bytes()),
    }
}

/// Handle to one on-disk cache directory. Passed explicitly into the runner;
/// there is no ambient singleton.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn open(dir: PathBuf) -> Self {
        CacheStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join("entries").join(format!("{key}.json"))
    }

    fn journal_path(&self, root: &Path) -> PathBuf {
        let id = sha256_hex(root.display().to_string().as_bytes());
        self.dir.join("journals").join(format!("{id}.json"))
    }

    /// Look up a stored result. Any I/O or parse failure is a miss.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "corrupt cache entry; treating as miss");
                return None;
            }
        };
        if entry.schema_version != CACHE_ENTRY_SCHEMA_VERSION || entry.key != key {
            return None;
        }
        Some(entry)
    }

    /// Persist a fresh result with an atomic rename.
    pub fn store(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.key);
        let bytes = serde_json::to_vec_pretty(entry).context("serialize cache entry")?;
        self.write_atomic(&path, &bytes)
    }

    /// Load the per-root fingerprint journal. Missing or corrupt journals
    /// start empty.
    pub fn load_journal(&self, root: &Path) -> FingerprintSet {
        let path = self.journal_path(root);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => FingerprintSet::default(),
        }
    }

    pub fn store_journal(&self, root: &Path, journal: &FingerprintSet) -> Result<()> {
        let path = self.journal_path(root);
        let bytes = serde_json::to_vec_pretty(journal).context("serialize fingerprint journal")?;
        self.write_atomic(&path, &bytes)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .context("cache path has no parent directory")?;
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        let tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        fs::write(tmp.path(), bytes).with_context(|| format!("write {}", tmp.path().display()))?;
        tmp.persist(path)
            .with_context(|| format!("publish {}", path.display()))?;
        Ok(())
    }
}
