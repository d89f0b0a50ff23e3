//! Structured warnings surfaced in the manifest.
//!
//! Warnings are accumulated in arrival order and never mutated after emission;
//! the manifest persists them verbatim so downstream tooling can act on the
//! symbolic code without parsing prose.
use serde::{Deserialize, Serialize};

/// Symbolic warning codes. Each code maps to exactly one recovery action.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    PathOutsideRoot,
    SymlinkSkipped,
    PatternUnmatched,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningCode::PathOutsideRoot => "PATH_OUTSIDE_ROOT",
            WarningCode::SymlinkSkipped => "SYMLINK_SKIPPED",
            WarningCode::PatternUnmatched => "PATTERN_UNMATCHED",
        }
    }
}

/// Component that emitted a warning.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningSource {
    Discovery,
    ScopeEvaluator,
}

/// A single recoverable event worth surfacing to the user.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WarningEvent {
    pub code: WarningCode,
    pub severity: String,
    pub message: String,
    pub action: String,
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_resolved: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub source: WarningSource,
}

impl WarningEvent {
    pub fn path_outside_root(root: &str, input: &str, resolved: &str) -> Self {
        WarningEvent {
            code: WarningCode::PathOutsideRoot,
            severity: "warning".to_string(),
            message: format!("path {input} resolves outside the scan root"),
            action: "skipped".to_string(),
            root: root.to_string(),
            path_input: Some(input.to_string()),
            path_resolved: Some(resolved.to_string()),
            pattern: None,
            source: WarningSource::Discovery,
        }
    }

    pub fn symlink_skipped(root: &str, input: &str) -> Self {
        WarningEvent {
            code: WarningCode::SymlinkSkipped,
            severity: "warning".to_string(),
            message: format!("path {input} contains a symlink component"),
            action: "skipped".to_string(),
            root: root.to_string(),
            path_input: Some(input.to_string()),
            path_resolved: None,
            pattern: None,
            source: WarningSource::Discovery,
        }
    }

    pub fn pattern_unmatched(root: &str, pattern: &str) -> Self {
        WarningEvent {
            code: WarningCode::PatternUnmatched,
            severity: "warning".to_string(),
            message: format!("pattern {pattern} matched no discovered files"),
            action: "ignored".to_string(),
            root: root.to_string(),
            path_input: None,
            path_resolved: None,
            pattern: Some(pattern.to_string()),
            source: WarningSource::ScopeEvaluator,
        }
    }
}
