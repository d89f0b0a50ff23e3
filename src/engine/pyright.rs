//! pyright adapter. `--outputjson` emits a single envelope with zero-based
//! positions; diagnostics are converted to one-based line/column.
use super::{Diagnostic, Engine};
use crate::plan::EnginePlan;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

pub struct Pyright;

#[derive(Debug, Deserialize)]
struct PyrightOutput {
    #[serde(default, rename = "generalDiagnostics")]
    general_diagnostics: Vec<PyrightDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct PyrightDiagnostic {
    file: String,
    severity: String,
    message: String,
    #[serde(default)]
    rule: Option<String>,
    #[serde(default)]
    range: Option<PyrightRange>,
}

#[derive(Debug, Deserialize)]
struct PyrightRange {
    start: PyrightPosition,
}

#[derive(Debug, Deserialize)]
struct PyrightPosition {
    line: u32,
    character: u32,
}

impl Engine for Pyright {
    fn id(&self) -> &'static str {
        "pyright"
    }

    fn tool_name(&self) -> &'static str {
        "pyright"
    }

    fn parse_version(&self, output: &str) -> Option<String> {
        // "pyright 1.1.390"
        let pattern = Regex::new(r"pyright (\d+\.\d+\.\d+)").ok()?;
        Some(pattern.captures(output)?.get(1)?.as_str().to_string())
    }

    fn build_args(&self, plan: &EnginePlan) -> Vec<String> {
        let mut args = vec!["--outputjson".to_string()];
        if let Some(config) = &plan.config_selection {
            args.push("--project".to_string());
            args.push(config.clone());
        }
        args.extend(plan.extra_args.iter().cloned());
        args.extend(plan.resolved_targets.iter().cloned());
        args
    }

    fn parse_output(&self, stdout: &str) -> Result<Vec<Diagnostic>> {
        let output: PyrightOutput =
            serde_json::from_str(stdout.trim()).context("parse pyright JSON envelope")?;
        let diagnostics = output
            .general_diagnostics
            .into_iter()
            .map(|diagnostic| {
                let (line, column) = diagnostic
                    .range
                    .map(|range| (range.start.line + 1, range.start.character + 1))
                    .unwrap_or((1, 1));
                Diagnostic {
                    path: diagnostic.file,
                    line,
                    column,
                    severity: diagnostic.severity,
                    code: diagnostic.rule,
                    message: diagnostic.message,
                }
            })
            .collect();
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_envelope_and_converts_positions() {
        let stdout = r#"{
            "version": "1.1.390",
            "generalDiagnostics": [
                {
                    "file": "/repo/src/a.py",
                    "severity": "error",
                    "message": "\"x\" is not defined",
                    "rule": "reportUndefinedVariable",
                    "range": {"start": {"line": 2, "character": 0}, "end": {"line": 2, "character": 1}}
                }
            ],
            "summary": {"filesAnalyzed": 1, "errorCount": 1}
        }"#;
        let diagnostics = Pyright.parse_output(stdout).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 3);
        assert_eq!(diagnostics[0].column, 1);
        assert_eq!(
            diagnostics[0].code.as_deref(),
            Some("reportUndefinedVariable")
        );
    }

    #[test]
    fn empty_diagnostics_envelope_is_valid() {
        let diagnostics = Pyright
            .parse_output(r#"{"generalDiagnostics": [], "summary": {}}"#)
            .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn non_json_output_is_a_parse_error() {
        assert!(Pyright.parse_output("segmentation fault").is_err());
    }

    #[test]
    fn version_probe_extracts_semver() {
        assert_eq!(
            Pyright.parse_version("pyright 1.1.390").as_deref(),
            Some("1.1.390")
        );
    }
}
