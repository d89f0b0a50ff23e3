//! Engine registry and capability interface.
//!
//! Engines are registered at startup into an explicit table keyed by a stable
//! string id. Each engine knows how to turn a plan into an argv, how to parse
//! its tool's stdout, and which extra files must participate in the cache
//! key. Nothing here invokes a tool; the execution boundary does.
use crate::plan::EnginePlan;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

mod mypy;
mod pyright;

pub use mypy::Mypy;
pub use pyright::Pyright;

/// One parsed diagnostic from an engine's structured output.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Diagnostic {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Fixed capability interface for a pluggable type-checking engine.
pub trait Engine: Send + Sync {
    fn id(&self) -> &'static str;

    /// Default tool binary name, resolvable via PATH or a `--tool` override.
    fn tool_name(&self) -> &'static str;

    fn version_args(&self) -> &'static [&'static str] {
        &["--version"]
    }

    /// Extract a comparable version string from the version probe output.
    fn parse_version(&self, output: &str) -> Option<String>;

    /// Flags whose argument values compare order-insensitively between two
    /// plans. Order-sensitive is the default; opting in is an explicit
    /// per-engine declaration.
    fn order_insensitive_flags(&self) -> &'static [&'static str] {
        &[]
    }

    /// Build the tool argv (excluding argv0) for one plan.
    fn build_args(&self, plan: &EnginePlan) -> Vec<String>;

    /// Parse structured stdout into diagnostics. An error here is classified
    /// as a parse failure, never as diagnostics.
    fn parse_output(&self, stdout: &str) -> Result<Vec<Diagnostic>>;

    /// Additional files whose content participates in the cache key,
    /// typically the engine's own config file.
    fn fingerprint_targets(&self, plan: &EnginePlan) -> Vec<PathBuf> {
        match &plan.config_selection {
            Some(config) => vec![plan.working_dir.join(config)],
            None => Vec::new(),
        }
    }
}

pub type EngineRegistry = BTreeMap<&'static str, Box<dyn Engine>>;

/// All engines known to this build, loaded into an explicit table.
pub fn builtin_registry() -> EngineRegistry {
    let mut registry: EngineRegistry = BTreeMap::new();
    for engine in [
        Box::new(Mypy) as Box<dyn Engine>,
        Box::new(Pyright) as Box<dyn Engine>,
    ] {
        registry.insert(engine.id(), engine);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_builtin_engines() {
        let registry = builtin_registry();
        let ids: Vec<&str> = registry.keys().copied().collect();
        assert_eq!(ids, vec!["mypy", "pyright"]);
    }

    #[test]
    fn config_selection_feeds_fingerprint_targets() {
        let registry = builtin_registry();
        let engine = registry.get("mypy").unwrap();
        let plan = EnginePlan {
            engine_id: "mypy".to_string(),
            mode: crate::paths::Mode::Full,
            resolved_targets: vec!["src/a.py".to_string()],
            config_selection: Some("mypy.ini".to_string()),
            extra_args: Vec::new(),
            enabled: true,
            profile: None,
            engine_env: BTreeMap::new(),
            working_dir: PathBuf::from("/repo"),
        };
        assert_eq!(
            engine.fingerprint_targets(&plan),
            vec![PathBuf::from("/repo/mypy.ini")]
        );
    }
}
