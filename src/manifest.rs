//! Versioned run manifest.
//!
//! The manifest is the only output surface of a check run: ordered engine
//! results, ordered warnings, scope-resolution provenance, and per-engine
//! configuration errors. Downstream budget/ratchet tooling consumes this
//! file and never sees raw plans.
use crate::exec::{EngineOutcome, EngineResult};
use crate::plan::ConfigError;
use crate::schedule::RequestedModes;
use crate::warnings::WarningEvent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Which source won precedence for each resolved list in one mode.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScopeProvenance {
    pub targets: String,
    pub include: String,
    pub exclude: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheCounters {
    pub hits: u32,
    pub misses: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u64,
    pub root: String,
    pub requested_modes: RequestedModes,
    pub provenance: BTreeMap<String, ScopeProvenance>,
    pub warnings: Vec<WarningEvent>,
    pub config_errors: Vec<ConfigError>,
    pub engines: Vec<EngineResult>,
    pub cache: CacheCounters,
    pub partial_failure: bool,
    pub aborted: bool,
}

impl Manifest {
    /// True when any engine failed structurally.
    pub fn has_engine_failures(&self) -> bool {
        self.engines
            .iter()
            .any(|result| matches!(result.outcome, EngineOutcome::Failure(_)))
    }

    pub fn write_pretty(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("serialize manifest")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize manifest")
    }
}

/// Human-readable one-screen summary for non-JSON invocations.
pub fn render_summary(manifest: &Manifest) -> String {
    let mut out = String::new();
    out.push_str(&format!("root: {}\n", manifest.root));
    for result in &manifest.engines {
        let line = match &result.outcome {
            EngineOutcome::Diagnostics(diagnostics) => format!(
                "{} [{}]: {} diagnostics{}\n",
                result.engine_id,
                result.mode.as_str(),
                diagnostics.len(),
                if result.cached { " (cached)" } else { "" }
            ),
            EngineOutcome::Failure(err) => format!(
                "{} [{}]: engine error ({})\n",
                result.engine_id,
                result.mode.as_str(),
                err.kind.as_str()
            ),
        };
        out.push_str(&line);
    }
    for err in &manifest.config_errors {
        out.push_str(&format!("{}: config error {}: {}\n", err.engine_id, err.code, err.detail));
    }
    if !manifest.warnings.is_empty() {
        out.push_str(&format!("warnings: {}\n", manifest.warnings.len()));
    }
    out.push_str(&format!(
        "cache: {} hits, {} misses\n",
        manifest.cache.hits, manifest.cache.misses
    ));
    out
}
