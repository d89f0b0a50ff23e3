//! CLI argument parsing for the check workflow.
//!
//! The CLI is intentionally thin: it collects inputs and hands them to the
//! runner without embedding precedence or scheduling policy, so the same core
//! logic is reusable as a library.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "typegate",
    version,
    about = "Aggregate diagnostics from pluggable static type-checking engines",
    after_help = "Examples:\n  typegate check\n  typegate check src tests --exclude 'gen/'\n  typegate check --mode full --engine mypy --out manifest.json\n  typegate check --engine-arg mypy=--strict --no-cache\n  typegate engines",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Check(CheckArgs),
    Engines(EnginesArgs),
}

/// Requested scan modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Current,
    Full,
    Both,
}

/// Check command inputs for a single run.
#[derive(Parser, Debug)]
#[command(about = "Run the registered engines and write a run manifest")]
pub struct CheckArgs {
    /// Target paths, relative to the root (current mode only)
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// Scan root directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Which scan modes to run
    #[arg(long, value_enum, default_value_t = ModeArg::Both)]
    pub mode: ModeArg,

    /// Include pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Exclude pattern (repeatable; prefix with ! for an exception)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Restrict the run to specific engines (repeatable)
    #[arg(long = "engine", value_name = "ID")]
    pub engines: Vec<String>,

    /// Extra argument for one engine, e.g. mypy=--strict (repeatable)
    #[arg(long = "engine-arg", value_name = "ID=ARG")]
    pub engine_args: Vec<String>,

    /// Config file selection for one engine, e.g. mypy=strict.ini
    #[arg(long = "engine-config", value_name = "ID=PATH")]
    pub engine_configs: Vec<String>,

    /// Tool binary override for one engine, e.g. mypy=/opt/bin/mypy
    #[arg(long = "tool", value_name = "ID=PATH")]
    pub tools: Vec<String>,

    /// Permit absolute target paths (anchored to the filesystem root)
    #[arg(long)]
    pub allow_absolute: bool,

    /// Maximum discovery depth below the root
    #[arg(long, value_name = "N", default_value_t = crate::discover::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Bypass cache lookups (fresh results are still stored)
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory override
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Wall-clock timeout per engine invocation, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_seconds: Option<f64>,

    /// Worker threads for file hashing
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Write the manifest to this path
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Print the manifest as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}

/// Engines command inputs.
#[derive(Parser, Debug)]
#[command(about = "List registered engines and tool availability")]
pub struct EnginesArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
