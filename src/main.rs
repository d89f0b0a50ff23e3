use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use typegate::cli::{CheckArgs, Command, EnginesArgs, ModeArg, RootArgs};
use typegate::engine::builtin_registry;
use typegate::manifest::render_summary;
use typegate::runner::{run_check, CheckOptions};
use typegate::RequestedModes;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = RootArgs::parse();
    match args.command {
        Command::Check(check) => run_check_command(check),
        Command::Engines(engines) => run_engines_command(engines),
    }
}

fn run_check_command(args: CheckArgs) -> Result<()> {
    if let Some(jobs) = args.jobs {
        // Ignored if a global pool already exists (e.g. under tests).
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global();
    }

    let mut options = CheckOptions::new(args.root.clone());
    options.requested_modes = match args.mode {
        ModeArg::Current => RequestedModes::CurrentOnly,
        ModeArg::Full => RequestedModes::FullOnly,
        ModeArg::Both => RequestedModes::Both,
    };
    // An absent repeatable flag is "not provided"; precedence falls through
    // to environment, then config, then defaults.
    options.cli_targets = provided(args.paths);
    options.cli_include = provided(args.include);
    options.cli_exclude = provided(args.exclude);
    options.engines = provided(args.engines);
    options.engine_args = parse_grouped_kv(&args.engine_args, "--engine-arg")?;
    options.engine_configs = parse_kv(&args.engine_configs, "--engine-config")?;
    options.tool_overrides = parse_kv(&args.tools, "--tool")?
        .into_iter()
        .map(|(engine, path)| (engine, PathBuf::from(path)))
        .collect();
    options.allow_absolute = args.allow_absolute;
    options.max_depth = args.max_depth;
    options.no_cache = args.no_cache;
    options.cache_dir = args.cache_dir;
    options.timeout = args.timeout_seconds.map(Duration::from_secs_f64);
    options.verbose = args.verbose;

    let registry = builtin_registry();
    let manifest = run_check(&options, &registry)?;

    if let Some(out) = &args.out {
        manifest.write_pretty(out)?;
    }
    if args.json {
        println!("{}", manifest.to_json_pretty()?);
    } else {
        print!("{}", render_summary(&manifest));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct EngineListing {
    id: String,
    tool: String,
    available: bool,
    resolved_path: Option<String>,
}

fn run_engines_command(args: EnginesArgs) -> Result<()> {
    let registry = builtin_registry();
    let mut listings = Vec::new();
    for engine in registry.values() {
        let resolved = which::which(engine.tool_name()).ok();
        listings.push(EngineListing {
            id: engine.id().to_string(),
            tool: engine.tool_name().to_string(),
            available: resolved.is_some(),
            resolved_path: resolved.map(|path| path.display().to_string()),
        });
    }
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&listings).context("serialize engine listing")?
        );
    } else {
        for listing in &listings {
            let status = match &listing.resolved_path {
                Some(path) => path.clone(),
                None => "not found".to_string(),
            };
            println!("{:<10} {:<10} {status}", listing.id, listing.tool);
        }
    }
    Ok(())
}

fn provided(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn split_kv<'a>(raw: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once('=')
        .ok_or_else(|| anyhow!("{flag} expects ID=VALUE, got {raw}"))
}

fn parse_kv(raw: &[String], flag: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in raw {
        let (engine, value) = split_kv(entry, flag)?;
        map.insert(engine.to_string(), value.to_string());
    }
    Ok(map)
}

fn parse_grouped_kv(raw: &[String], flag: &str) -> Result<BTreeMap<String, Vec<String>>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in raw {
        let (engine, value) = split_kv(entry, flag)?;
        map.entry(engine.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(map)
}
