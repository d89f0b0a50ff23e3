//! Run configuration: `typegate.json` plus environment-declared scope lists.
//!
//! The loader only supplies inputs; precedence between sources is the
//! resolver's job. Environment lists are shell-token encoded, never
//! comma-joined, so entries may contain spaces.
use crate::plan::EngineSettings;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "typegate.json";
pub const ENV_TARGETS: &str = "TYPEGATE_TARGETS";
pub const ENV_INCLUDE: &str = "TYPEGATE_INCLUDE";
pub const ENV_EXCLUDE: &str = "TYPEGATE_EXCLUDE";

/// Per-engine block in `typegate.json`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineFileConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Root config file shape. All lists are optional so "not provided" stays
/// distinguishable from "explicitly empty".
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub engines: BTreeMap<String, EngineFileConfig>,
}

pub fn load_file_config(root: &Path) -> Result<Option<FileConfig>> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let config: FileConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(config))
}

/// Scope lists declared through the environment. `Some(vec![])` means the
/// variable was set to an empty string: an explicitly empty list.
#[derive(Debug, Clone, Default)]
pub struct EnvInputs {
    pub targets: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

pub fn env_inputs() -> Result<EnvInputs> {
    Ok(EnvInputs {
        targets: read_env_list(ENV_TARGETS)?,
        include: read_env_list(ENV_INCLUDE)?,
        exclude: read_env_list(ENV_EXCLUDE)?,
    })
}

fn read_env_list(name: &str) -> Result<Option<Vec<String>>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(parse_env_list(&value).with_context(|| {
            format!("parse environment list {name}")
        })?)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("read environment list {name}")),
    }
}

/// Split one environment value into an ordered list of shell tokens. A
/// malformed value (unbalanced quote) is a configuration error, never an
/// empty list.
pub fn parse_env_list(value: &str) -> Result<Vec<String>> {
    shell_words::split(value).context("split shell-encoded list")
}

/// Merge the per-engine settings for one engine id from the config file and
/// CLI-supplied extras. CLI args append after config args so final inputs
/// order-reproduce run to run.
pub fn engine_settings(
    file: Option<&FileConfig>,
    engine_id: &str,
    cli_args: &[String],
    cli_config: Option<&str>,
) -> EngineSettings {
    let block = file
        .and_then(|file| file.engines.get(engine_id))
        .cloned()
        .unwrap_or_default();
    let mut extra_args = block.args.unwrap_or_default();
    extra_args.extend(cli_args.iter().cloned());
    EngineSettings {
        enabled: block.enabled.unwrap_or(true),
        config_file: cli_config
            .map(str::to_string)
            .or(block.config),
        extra_args,
        paths: block.paths,
        profile: block.profile,
        env: block.env,
    }
}
