//! Engine plan construction.
//!
//! An `EnginePlan` is the complete, immutable input bundle for one engine in
//! one mode. Equality is defined over exactly these fields so two plans are
//! the unit of deduplication; nothing belonging to another engine or to
//! global run metadata participates.
use crate::paths::{Mode, RootedPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-engine configuration resolved by the configuration loader before plan
/// building. `paths: Some(vec![])` is an explicit empty scope and deselects
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub enabled: bool,
    pub config_file: Option<String>,
    pub extra_args: Vec<String>,
    pub paths: Option<Vec<String>>,
    pub profile: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl EngineSettings {
    pub fn enabled_default() -> Self {
        EngineSettings {
            enabled: true,
            ..EngineSettings::default()
        }
    }
}

/// A configuration error isolated to one engine. Other engines proceed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigError {
    pub engine_id: String,
    pub code: String,
    pub detail: String,
}

/// Result of plan building, consumed explicitly by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Plan(EnginePlan),
    Deselected(ConfigError),
}

/// The canonical input bundle for one engine/mode pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePlan {
    pub engine_id: String,
    pub mode: Mode,
    pub resolved_targets: Vec<String>,
    pub config_selection: Option<String>,
    pub extra_args: Vec<String>,
    pub enabled: bool,
    pub profile: Option<String>,
    pub engine_env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
}

impl EnginePlan {
    /// Extra args normalized for equivalence checks. Values of flags the
    /// engine declares order-insensitive are grouped with their flag and the
    /// groups sorted; everything else keeps its supplied order. Default is
    /// fully order-sensitive.
    pub fn comparable_args(&self, order_insensitive_flags: &[&str]) -> Vec<String> {
        if order_insensitive_flags.is_empty() {
            return self.extra_args.clone();
        }
        let mut ordered = Vec::new();
        let mut insensitive: Vec<String> = Vec::new();
        let mut args = self.extra_args.iter().peekable();
        while let Some(arg) = args.next() {
            if order_insensitive_flags.contains(&arg.as_str()) {
                let value = args
                    .peek()
                    .filter(|next| !next.starts_with('-'))
                    .map(|next| (*next).clone());
                if let Some(value) = value {
                    args.next();
                    insensitive.push(format!("{arg}={value}"));
                } else {
                    insensitive.push(arg.clone());
                }
            } else {
                ordered.push(arg.clone());
            }
        }
        insensitive.sort();
        ordered.extend(insensitive);
        ordered
    }
}

/// Build the plan for one engine in one mode from the eligible scope and that
/// engine's resolved settings only.
pub fn build_plan(
    engine_id: &str,
    mode: Mode,
    eligible: &[RootedPath],
    settings: &EngineSettings,
    working_dir: &Path,
) -> PlanOutcome {
    let resolved_targets = match &settings.paths {
        Some(paths) if paths.is_empty() => {
            return PlanOutcome::Deselected(ConfigError {
                engine_id: engine_id.to_string(),
                code: "EMPTY_SCOPE".to_string(),
                detail: format!(
                    "engine {engine_id} resolved an explicitly empty scope; \
                     refusing to forward an empty target list"
                ),
            });
        }
        Some(paths) => {
            let mut targets: Vec<String> = eligible
                .iter()
                .map(RootedPath::rel)
                .filter(|rel| paths.iter().any(|prefix| under_prefix(rel, prefix)))
                .map(str::to_string)
                .collect();
            targets.sort();
            targets.dedup();
            targets
        }
        None => eligible.iter().map(|path| path.rel().to_string()).collect(),
    };
    PlanOutcome::Plan(EnginePlan {
        engine_id: engine_id.to_string(),
        mode,
        resolved_targets,
        config_selection: settings.config_file.clone(),
        extra_args: settings.extra_args.clone(),
        enabled: settings.enabled,
        profile: settings.profile.clone(),
        engine_env: settings.env.clone(),
        working_dir: working_dir.to_path_buf(),
    })
}

fn under_prefix(rel: &str, prefix: &str) -> bool {
    if prefix == "." {
        return true;
    }
    rel == prefix || rel.starts_with(&format!("{prefix}/"))
}
