//! Root-relative path model and scope resolution.
//!
//! Scope inputs arrive from several sources with strict precedence. The
//! resolver collapses them into one canonical, order-independent form so two
//! logically identical invocations always compare equal downstream.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Scan variant. `Current` participates in CLI positional arguments;
/// `Full` never does and resolves as if none were given.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Current,
    Full,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Current => "current",
            Mode::Full => "full",
        }
    }
}

/// An absolute path paired with its canonical root-relative posix form.
///
/// The relative form uses `/` separators only, contains no `.`/`..` segments,
/// and is always nested under the declared root. Entries admitted through the
/// absolute-path allowance are anchored to the filesystem root and keep their
/// leading `/`, so the form stays a valid path from any working directory.
/// Only the resolver and the discovery walk construct these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootedPath {
    abs: PathBuf,
    rel: String,
}

impl RootedPath {
    pub(crate) fn new(abs: PathBuf, rel: String) -> Self {
        RootedPath { abs, rel }
    }

    pub fn abs(&self) -> &Path {
        &self.abs
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }
}

impl Ord for RootedPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rel.cmp(&other.rel)
    }
}

impl PartialOrd for RootedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Which input source won precedence for a resolved list.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSource {
    Cli,
    Env,
    Config,
    Default,
}

impl ScopeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeSource::Cli => "cli",
            ScopeSource::Env => "env",
            ScopeSource::Config => "config",
            ScopeSource::Default => "default",
        }
    }
}

/// One scope list as supplied by each source. `None` means "not provided";
/// `Some(vec![])` is an explicitly empty list and still wins precedence.
#[derive(Debug, Clone, Default)]
pub struct ScopeInputs {
    pub cli: Option<Vec<String>>,
    pub env: Option<Vec<String>>,
    pub config: Option<Vec<String>>,
}

/// A resolved, canonicalized scope list plus the source that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub entries: Vec<String>,
    pub source: ScopeSource,
}

fn winning_source(inputs: &ScopeInputs) -> (Option<Vec<String>>, ScopeSource) {
    if let Some(cli) = inputs.cli.clone() {
        return (Some(cli), ScopeSource::Cli);
    }
    if let Some(env) = inputs.env.clone() {
        return (Some(env), ScopeSource::Env);
    }
    if let Some(config) = inputs.config.clone() {
        return (Some(config), ScopeSource::Config);
    }
    (None, ScopeSource::Default)
}

/// Resolve target paths for one mode. The first provided source wins outright
/// and replaces all lower sources; it never merges with them. Full mode
/// resolves as if no positional arguments were given.
pub fn resolve_targets(
    mode: Mode,
    inputs: &ScopeInputs,
    default: &[&str],
    allow_absolute: bool,
) -> Result<ResolvedScope> {
    let (raw, source) = if mode == Mode::Full {
        let without_positionals = ScopeInputs {
            cli: None,
            env: inputs.env.clone(),
            config: inputs.config.clone(),
        };
        winning_source(&without_positionals)
    } else {
        winning_source(inputs)
    };
    let raw = raw.unwrap_or_else(|| default.iter().map(|entry| entry.to_string()).collect());
    let mut entries = Vec::with_capacity(raw.len());
    for input in &raw {
        entries.push(canonicalize_input(input, allow_absolute)?);
    }
    entries.sort();
    entries.dedup();
    Ok(ResolvedScope { entries, source })
}

/// Resolve a pattern list (includes or excludes). Unlike positional targets,
/// pattern flags are named and apply to every requested mode. Patterns keep
/// their supplied order, minus duplicates; canonicalization does not apply.
pub fn resolve_patterns(inputs: &ScopeInputs) -> ResolvedScope {
    let (raw, source) = winning_source(inputs);
    let raw = raw.unwrap_or_default();
    let mut entries = Vec::with_capacity(raw.len());
    for pattern in raw {
        if !entries.contains(&pattern) {
            entries.push(pattern);
        }
    }
    ResolvedScope { entries, source }
}

/// Canonicalize one scope input: `/` separators, no `.` segments, no escape
/// above the root. Absolute inputs are fatal unless explicitly allowed, in
/// which case they anchor to the filesystem root.
fn canonicalize_input(input: &str, allow_absolute: bool) -> Result<String> {
    let normalized = input.replace('\\', "/");
    let absolute = normalized.starts_with('/');
    if absolute && !allow_absolute {
        bail!("absolute scope path {input} is not allowed (pass --allow-absolute to permit it)");
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    bail!("scope path {input} escapes the scan root");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    Ok(if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    })
}

/// Build the canonical relative form for an absolute path already known to
/// live under `root`. Returns `None` when the path is not nested under it.
pub(crate) fn relative_to_root(root: &Path, abs: &Path) -> Option<String> {
    let stripped = abs.strip_prefix(root).ok()?;
    let mut rel = String::new();
    for component in stripped.components() {
        let segment = component.as_os_str().to_str()?;
        if !rel.is_empty() {
            rel.push('/');
        }
        rel.push_str(segment);
    }
    if rel.is_empty() {
        return None;
    }
    Some(rel)
}
