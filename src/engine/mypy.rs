//! mypy adapter. Diagnostics arrive as JSON objects, one per line; summary
//! lines are plain text and carry no diagnostic content.
use super::{Diagnostic, Engine};
use crate::plan::EnginePlan;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

pub struct Mypy;

#[derive(Debug, Deserialize)]
struct MypyLine {
    file: String,
    line: u32,
    column: u32,
    severity: String,
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl Engine for Mypy {
    fn id(&self) -> &'static str {
        "mypy"
    }

    fn tool_name(&self) -> &'static str {
        "mypy"
    }

    fn parse_version(&self, output: &str) -> Option<String> {
        // "mypy 1.11.2 (compiled: yes)"
        let pattern = Regex::new(r"mypy (\d+\.\d+(?:\.\d+)?)").ok()?;
        Some(pattern.captures(output)?.get(1)?.as_str().to_string())
    }

    fn build_args(&self, plan: &EnginePlan) -> Vec<String> {
        let mut args = vec!["--output".to_string(), "json".to_string()];
        if let Some(config) = &plan.config_selection {
            args.push("--config-file".to_string());
            args.push(config.clone());
        }
        args.extend(plan.extra_args.iter().cloned());
        args.extend(plan.resolved_targets.iter().cloned());
        args
    }

    fn parse_output(&self, stdout: &str) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        for line in stdout.lines() {
            let trimmed = line.trim();
            // Summary lines ("Found 2 errors...", "Success: ...") are text.
            if !trimmed.starts_with('{') {
                continue;
            }
            let parsed: MypyLine = serde_json::from_str(trimmed)
                .with_context(|| format!("parse mypy JSON line: {trimmed}"))?;
            diagnostics.push(Diagnostic {
                path: parsed.file,
                line: parsed.line,
                column: parsed.column,
                severity: parsed.severity,
                code: parsed.code,
                message: parsed.message,
            });
        }
        Ok(diagnostics)
    }
}
