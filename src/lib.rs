//! Diagnostics aggregation over pluggable static type-checking engines.
//!
//! The core is an execution-planning and incremental-caching pipeline:
//! resolve scope inputs into a canonical form, discover files safely, build
//! one immutable plan per engine and mode, deduplicate equivalent plans, and
//! serve cached results keyed on content fingerprints so unchanged trees
//! never re-invoke an external tool.

pub mod cache;
pub mod cli;
pub mod config;
pub mod discover;
pub mod engine;
pub mod exec;
pub mod fingerprint;
pub mod manifest;
pub mod paths;
pub mod patterns;
pub mod plan;
pub mod runner;
pub mod schedule;
pub mod util;
pub mod warnings;

pub use engine::{builtin_registry, Engine, EngineRegistry};
pub use manifest::Manifest;
pub use paths::Mode;
pub use runner::{run_check, CheckOptions};
pub use schedule::RequestedModes;
