//! Execution boundary: invoke one external tool per plan and classify the
//! result.
//!
//! Classification is strict. Syntactically valid structured stdout is
//! diagnostics regardless of exit code; anything else (no output, unparseable
//! output, spawn failure, crash, timeout) is a structured engine error.
//! Stderr is never promoted to diagnostics, only excerpted into errors.
use crate::engine::Engine;
use crate::paths::Mode;
use crate::plan::EnginePlan;
use crate::util::truncate_bytes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const MAX_STDERR_EXCERPT_BYTES: usize = 4096;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Symbolic failure kind for an engine error.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    ToolNotFound,
    ParseFailed,
    NoOutput,
    Crashed,
    Timeout,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ToolNotFound => "tool-not-found",
            FailureKind::ParseFailed => "parse-failed",
            FailureKind::NoOutput => "no-output",
            FailureKind::Crashed => "crashed",
            FailureKind::Timeout => "timeout",
        }
    }
}

/// Structural execution failure, distinct from diagnostics.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineError {
    pub engine_id: String,
    pub mode: Mode,
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    pub command: String,
    pub working_dir: String,
    pub stderr_excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Either parsed diagnostics or a structural failure. Never both.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineOutcome {
    Diagnostics(Vec<crate::engine::Diagnostic>),
    Failure(EngineError),
}

/// The record produced for one invocation (or cache hit).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineResult {
    pub engine_id: String,
    pub mode: Mode,
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub cached: bool,
    pub outcome: EngineOutcome,
}

/// Locate the tool binary for an engine, honoring `--tool` overrides.
pub fn resolve_tool(
    engine: &dyn Engine,
    overrides: &BTreeMap<String, PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = overrides.get(engine.id()) {
        return Ok(path.clone());
    }
    which::which(engine.tool_name())
        .with_context(|| format!("locate tool {} for engine {}", engine.tool_name(), engine.id()))
}

/// Probe the tool's version for cache-key purposes. Falls back to the first
/// output line when the engine cannot extract a structured version.
pub fn probe_tool_version(engine: &dyn Engine, tool: &Path) -> Result<String> {
    let output = Command::new(tool)
        .args(engine.version_args())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("probe version of {}", tool.display()))?;
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    if let Some(version) = engine.parse_version(&text) {
        return Ok(version);
    }
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        Ok("unknown".to_string())
    } else {
        Ok(first_line.to_string())
    }
}

/// Run one plan to completion and classify the result. Invocation failures
/// are captured in the result, never raised. Raising `cancel` terminates an
/// in-flight tool the same way a timeout does; the partial result is
/// discarded by the caller and never cached.
pub fn execute(
    engine: &dyn Engine,
    plan: &EnginePlan,
    tool: &Path,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
) -> EngineResult {
    let args = engine.build_args(plan);
    let command = format_command_line(&tool.display().to_string(), &args);
    let started = Instant::now();

    let mut cmd = Command::new(tool);
    cmd.args(&args)
        .current_dir(&plan.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &plan.engine_env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                FailureKind::ToolNotFound
            } else {
                FailureKind::Crashed
            };
            return failure_result(plan, command, started, None, kind, String::new(), Some(err.to_string()));
        }
    };

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_with_timeout(&mut child, timeout, cancel);
    let stdout_bytes = stdout_reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr_bytes = stderr_reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr_excerpt = truncate_bytes(&stderr_bytes, MAX_STDERR_EXCERPT_BYTES);

    let status = match status {
        WaitOutcome::Finished(status) => status,
        WaitOutcome::TimedOut => {
            return failure_result(
                plan,
                command,
                started,
                None,
                FailureKind::Timeout,
                stderr_excerpt,
                None,
            );
        }
        WaitOutcome::Cancelled => {
            return failure_result(
                plan,
                command,
                started,
                None,
                FailureKind::Crashed,
                stderr_excerpt,
                Some("terminated by run cancellation".to_string()),
            );
        }
        WaitOutcome::WaitError(err) => {
            return failure_result(
                plan,
                command,
                started,
                None,
                FailureKind::Crashed,
                stderr_excerpt,
                Some(err),
            );
        }
    };

    let exit_code = status.code();
    if exit_code.is_none() {
        return failure_result(
            plan,
            command,
            started,
            None,
            FailureKind::Crashed,
            stderr_excerpt,
            Some("terminated by signal".to_string()),
        );
    }

    let stdout = String::from_utf8_lossy(&stdout_bytes);
    if stdout.trim().is_empty() {
        return failure_result(
            plan,
            command,
            started,
            exit_code,
            FailureKind::NoOutput,
            stderr_excerpt,
            None,
        );
    }
    match engine.parse_output(&stdout) {
        Ok(diagnostics) => EngineResult {
            engine_id: plan.engine_id.clone(),
            mode: plan.mode,
            command,
            exit_code,
            duration_ms: started.elapsed().as_millis() as u64,
            cached: false,
            outcome: EngineOutcome::Diagnostics(diagnostics),
        },
        Err(err) => failure_result(
            plan,
            command,
            started,
            exit_code,
            FailureKind::ParseFailed,
            stderr_excerpt,
            Some(format!("{err:#}")),
        ),
    }
}

enum WaitOutcome {
    Finished(ExitStatus),
    TimedOut,
    Cancelled,
    WaitError(String),
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
) -> WaitOutcome {
    if timeout.is_none() && cancel.is_none() {
        return match child.wait() {
            Ok(status) => WaitOutcome::Finished(status),
            Err(err) => WaitOutcome::WaitError(err.to_string()),
        };
    }
    let deadline = timeout.map(|limit| Instant::now() + limit);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Finished(status),
            Ok(None) => {}
            Err(err) => return WaitOutcome::WaitError(err.to_string()),
        }
        // Partial output from a killed tool is discarded by the caller and
        // never cached.
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            let _ = child.kill();
            let _ = child.wait();
            return WaitOutcome::Cancelled;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let _ = child.kill();
            let _ = child.wait();
            return WaitOutcome::TimedOut;
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> Option<std::thread::JoinHandle<Vec<u8>>> {
    source.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

#[allow(clippy::too_many_arguments)]
fn failure_result(
    plan: &EnginePlan,
    command: String,
    started: Instant,
    exit_code: Option<i32>,
    kind: FailureKind,
    stderr_excerpt: String,
    detail: Option<String>,
) -> EngineResult {
    EngineResult {
        engine_id: plan.engine_id.clone(),
        mode: plan.mode,
        command: command.clone(),
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
        cached: false,
        outcome: EngineOutcome::Failure(EngineError {
            engine_id: plan.engine_id.clone(),
            mode: plan.mode,
            kind,
            exit_code,
            command,
            working_dir: plan.working_dir.display().to_string(),
            stderr_excerpt,
            detail,
        }),
    }
}

pub fn format_command_line(binary_name: &str, argv: &[String]) -> String {
    let mut parts = Vec::with_capacity(argv.len() + 1);
    parts.push(shell_quote(binary_name));
    for arg in argv {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg.chars().all(|ch| {
        matches!(
            ch,
            'a'..='z'
                | 'A'..='Z'
                | '0'..='9'
                | '_'
                | '-'
                | '.'
                | '/'
                | ':'
                | '@'
                | '+'
                | '='
        )
    });
    if safe {
        return arg.to_string();
    }
    let escaped = arg.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}
