//! End-to-end check workflow.
//!
//! Resolution, discovery, evaluation, plan building, and scheduling are pure
//! transformations executed per mode; fingerprinting and tool invocation are
//! the only blocking stages. The run plan is immutable once built and is
//! consumed strictly in order, so two runs with identical inputs produce
//! identical manifests modulo timing.
use crate::cache::{derive_key, CacheEntry, CacheStore, CACHE_ENTRY_SCHEMA_VERSION};
use crate::config::{self, FileConfig};
use crate::engine::{Engine, EngineRegistry};
use crate::exec::{
    execute, format_command_line, probe_tool_version, resolve_tool, EngineError, EngineOutcome,
    EngineResult, FailureKind,
};
use crate::fingerprint::{fingerprint_configs, fingerprint_files, FingerprintSet};
use crate::manifest::{CacheCounters, Manifest, ScopeProvenance, MANIFEST_SCHEMA_VERSION};
use crate::paths::{resolve_patterns, resolve_targets, Mode, RootedPath, ScopeInputs, ScopeSource};
use crate::plan::build_plan;
use crate::schedule::{schedule_engine, RequestedModes, RunPlan, ScheduledInvocation};
use crate::warnings::WarningEvent;
use crate::{discover, patterns, util};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// All inputs for one check run. `None` list fields mean "not provided" so
/// precedence stays observable.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub root: PathBuf,
    pub requested_modes: RequestedModes,
    pub cli_targets: Option<Vec<String>>,
    pub cli_include: Option<Vec<String>>,
    pub cli_exclude: Option<Vec<String>>,
    pub engines: Option<Vec<String>>,
    pub engine_args: BTreeMap<String, Vec<String>>,
    pub engine_configs: BTreeMap<String, String>,
    pub tool_overrides: BTreeMap<String, PathBuf>,
    pub allow_absolute: bool,
    pub max_depth: usize,
    pub no_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub verbose: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl CheckOptions {
    pub fn new(root: PathBuf) -> Self {
        CheckOptions {
            root,
            requested_modes: RequestedModes::Both,
            cli_targets: None,
            cli_include: None,
            cli_exclude: None,
            engines: None,
            engine_args: BTreeMap::new(),
            engine_configs: BTreeMap::new(),
            tool_overrides: BTreeMap::new(),
            allow_absolute: false,
            max_depth: discover::DEFAULT_MAX_DEPTH,
            no_cache: false,
            cache_dir: None,
            timeout: None,
            verbose: false,
            cancel: None,
        }
    }
}

/// Scope resolution output for one mode. Unmatched-pattern warnings are kept
/// apart from discovery warnings; a pattern only counts as unmatched for the
/// run when it matched nothing in any evaluated mode.
struct ModeScope {
    eligible: Vec<RootedPath>,
    by_rel: BTreeMap<String, RootedPath>,
    provenance: ScopeProvenance,
    warnings: Vec<WarningEvent>,
    unmatched: Vec<WarningEvent>,
}

pub fn default_cache_dir(root: &std::path::Path) -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("typegate"))
        .unwrap_or_else(|| root.join(".typegate-cache"))
}

pub fn run_check(options: &CheckOptions, registry: &EngineRegistry) -> Result<Manifest> {
    let root = options
        .root
        .canonicalize()
        .with_context(|| format!("resolve root {}", options.root.display()))?;
    let file_config = config::load_file_config(&root)?;
    let env = config::env_inputs()?;

    let cache_dir = options
        .cache_dir
        .clone()
        .unwrap_or_else(|| default_cache_dir(&root));
    let store = CacheStore::open(cache_dir);

    let mut scopes: BTreeMap<Mode, ModeScope> = BTreeMap::new();
    for mode in [Mode::Current, Mode::Full] {
        if !options.requested_modes.wants(mode) {
            continue;
        }
        scopes.insert(
            mode,
            resolve_mode_scope(mode, options, &root, file_config.as_ref(), &env)?,
        );
    }

    // Discovery warnings accumulate in mode order with exact duplicates
    // collapsed so overlapping discoveries surface once.
    let mut warnings: Vec<WarningEvent> = Vec::new();
    let mut provenance = BTreeMap::new();
    for (mode, scope) in &scopes {
        for warning in &scope.warnings {
            if !warnings.contains(warning) {
                warnings.push(warning.clone());
            }
        }
        provenance.insert(mode.as_str().to_string(), scope.provenance.clone());
    }
    // A pattern that matched in one mode but not another did its job; only
    // patterns unmatched in every evaluated mode warn.
    if let Some(first) = scopes.values().next() {
        for warning in &first.unmatched {
            if scopes.values().all(|scope| scope.unmatched.contains(warning))
                && !warnings.contains(warning)
            {
                warnings.push(warning.clone());
            }
        }
    }

    let selected = selected_engines(options, registry)?;
    let mut run_plan = RunPlan::default();
    for engine_id in &selected {
        let engine = registry
            .get(engine_id.as_str())
            .ok_or_else(|| anyhow!("engine {engine_id} missing from registry"))?;
        let cli_args = options
            .engine_args
            .get(engine_id)
            .cloned()
            .unwrap_or_default();
        let settings = config::engine_settings(
            file_config.as_ref(),
            engine_id,
            &cli_args,
            options.engine_configs.get(engine_id).map(String::as_str),
        );
        let outcome_for = |mode: Mode| {
            scopes
                .get(&mode)
                .map(|scope| build_plan(engine_id, mode, &scope.eligible, &settings, &root))
        };
        let (invocations, config_error) = schedule_engine(
            options.requested_modes,
            outcome_for(Mode::Current),
            outcome_for(Mode::Full),
            engine.order_insensitive_flags(),
        );
        run_plan.invocations.extend(invocations);
        if let Some(err) = config_error {
            if options.verbose {
                eprintln!("engine {} deselected: {}", err.engine_id, err.detail);
            }
            run_plan.config_errors.push(err);
        }
    }

    let mut journal = store.load_journal(&root);
    let mut counters = CacheCounters::default();
    let mut results: Vec<EngineResult> = Vec::new();
    let mut tool_versions: BTreeMap<String, Result<(PathBuf, String), String>> = BTreeMap::new();
    let mut aborted = false;

    for invocation in &run_plan.invocations {
        if let Some(cancel) = &options.cancel {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!("run aborted between scheduled invocations");
                aborted = true;
                break;
            }
        }
        let engine = registry
            .get(invocation.engine_id.as_str())
            .ok_or_else(|| anyhow!("engine {} missing from registry", invocation.engine_id))?;
        let result = run_invocation(
            options,
            &store,
            engine.as_ref(),
            invocation,
            &scopes,
            &mut journal,
            &mut tool_versions,
            &mut counters,
        )?;
        if let Some(cancel) = &options.cancel {
            if cancel.load(Ordering::SeqCst) {
                // The invocation was terminated mid-flight; its partial
                // result is discarded and was never cached.
                tracing::info!("run aborted; discarding in-flight result");
                aborted = true;
                break;
            }
        }
        if options.verbose {
            eprintln!(
                "{} [{}]: {}",
                result.engine_id,
                result.mode.as_str(),
                match &result.outcome {
                    EngineOutcome::Diagnostics(diagnostics) =>
                        format!("{} diagnostics", diagnostics.len()),
                    EngineOutcome::Failure(err) => format!("engine error ({})", err.kind.as_str()),
                }
            );
        }
        results.push(result);
    }

    if let Err(err) = store.store_journal(&root, &journal) {
        tracing::warn!(%err, "failed to persist fingerprint journal");
    }

    let partial_failure = !run_plan.config_errors.is_empty()
        || results
            .iter()
            .any(|result| matches!(result.outcome, EngineOutcome::Failure(_)));

    Ok(Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        generated_at_epoch_ms: util::now_epoch_ms()?,
        root: root.display().to_string(),
        requested_modes: options.requested_modes,
        provenance,
        warnings,
        config_errors: run_plan.config_errors,
        engines: results,
        cache: counters,
        partial_failure,
        aborted,
    })
}

fn resolve_mode_scope(
    mode: Mode,
    options: &CheckOptions,
    root: &std::path::Path,
    file_config: Option<&FileConfig>,
    env: &config::EnvInputs,
) -> Result<ModeScope> {
    let target_inputs = ScopeInputs {
        cli: options.cli_targets.clone(),
        env: env.targets.clone(),
        config: file_config.and_then(|file| file.paths.clone()),
    };
    let include_inputs = ScopeInputs {
        cli: options.cli_include.clone(),
        env: env.include.clone(),
        config: file_config.and_then(|file| file.include.clone()),
    };
    let exclude_inputs = ScopeInputs {
        cli: options.cli_exclude.clone(),
        env: env.exclude.clone(),
        config: file_config.and_then(|file| file.exclude.clone()),
    };

    let targets = resolve_targets(mode, &target_inputs, &["."], options.allow_absolute)?;
    let include = resolve_patterns(&include_inputs);
    let exclude = resolve_patterns(&exclude_inputs);

    let (candidates, warnings) = discover::discover(root, &targets, options.max_depth)?;
    let scope = patterns::compile_scope(&include.entries, &exclude.entries)?;
    let (eligible, stats) = patterns::evaluate(&scope, &candidates);
    let unmatched = patterns::unmatched_pattern_warnings(
        &root.display().to_string(),
        &scope,
        &stats,
        include.source == ScopeSource::Default,
        exclude.source == ScopeSource::Default,
    );

    let by_rel = eligible
        .iter()
        .map(|path| (path.rel().to_string(), path.clone()))
        .collect();
    Ok(ModeScope {
        eligible,
        by_rel,
        provenance: ScopeProvenance {
            targets: targets.source.as_str().to_string(),
            include: include.source.as_str().to_string(),
            exclude: exclude.source.as_str().to_string(),
        },
        warnings,
        unmatched,
    })
}

fn selected_engines(options: &CheckOptions, registry: &EngineRegistry) -> Result<Vec<String>> {
    match &options.engines {
        Some(ids) => {
            let mut selected = Vec::new();
            for id in ids {
                if !registry.contains_key(id.as_str()) {
                    bail!("unknown engine {id}; known engines: {:?}", registry_ids(registry));
                }
                if !selected.contains(id) {
                    selected.push(id.clone());
                }
            }
            selected.sort();
            Ok(selected)
        }
        None => Ok(registry_ids(registry)),
    }
}

fn registry_ids(registry: &EngineRegistry) -> Vec<String> {
    registry.keys().map(|id| id.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn run_invocation(
    options: &CheckOptions,
    store: &CacheStore,
    engine: &dyn Engine,
    invocation: &ScheduledInvocation,
    scopes: &BTreeMap<Mode, ModeScope>,
    journal: &mut FingerprintSet,
    tool_versions: &mut BTreeMap<String, Result<(PathBuf, String), String>>,
    counters: &mut CacheCounters,
) -> Result<EngineResult> {
    let plan = &invocation.plan;
    let scope = scopes
        .get(&invocation.mode)
        .ok_or_else(|| anyhow!("no scope resolved for mode {}", invocation.mode.as_str()))?;
    let targets: Vec<RootedPath> = plan
        .resolved_targets
        .iter()
        .filter_map(|rel| scope.by_rel.get(rel).cloned())
        .collect();

    let probe = tool_versions
        .entry(invocation.engine_id.clone())
        .or_insert_with(|| {
            let tool = resolve_tool(engine, &options.tool_overrides)
                .map_err(|err| format!("{err:#}"))?;
            let version = probe_tool_version(engine, &tool).map_err(|err| format!("{err:#}"))?;
            tracing::debug!(engine = %engine.id(), version = %version, "tool version probed");
            Ok((tool, version))
        });
    let (tool, tool_version) = match probe {
        Ok((tool, version)) => (tool.clone(), version.clone()),
        Err(detail) => {
            return Ok(tool_unavailable_result(engine, invocation, detail.clone()));
        }
    };

    let file_fingerprints = fingerprint_files(&targets, journal)?;
    for (rel, fingerprint) in &file_fingerprints {
        journal.insert(rel.clone(), fingerprint.clone());
    }
    let config_fingerprints = fingerprint_configs(&engine.fingerprint_targets(plan));

    let args = engine.build_args(plan);
    let mut command_repr = vec![tool.display().to_string()];
    command_repr.extend(args.iter().cloned());
    let key = derive_key(
        &invocation.engine_id,
        invocation.mode,
        &command_repr,
        &tool_version,
        &config_fingerprints,
        &file_fingerprints,
    );

    if !options.no_cache {
        if let Some(entry) = store.lookup(&key) {
            tracing::info!(engine = %invocation.engine_id, mode = invocation.mode.as_str(), "cache hit");
            counters.hits += 1;
            return Ok(EngineResult {
                engine_id: entry.engine_id,
                mode: entry.mode,
                command: entry.command_fingerprint,
                exit_code: entry.exit_code,
                duration_ms: 0,
                cached: true,
                outcome: EngineOutcome::Diagnostics(entry.diagnostics),
            });
        }
    }
    counters.misses += 1;
    tracing::info!(engine = %invocation.engine_id, mode = invocation.mode.as_str(), "cache miss; invoking tool");

    let result = execute(engine, plan, &tool, options.timeout, options.cancel.as_deref());
    if let EngineOutcome::Diagnostics(diagnostics) = &result.outcome {
        let entry = CacheEntry {
            schema_version: CACHE_ENTRY_SCHEMA_VERSION,
            key,
            engine_id: result.engine_id.clone(),
            mode: result.mode,
            diagnostics: diagnostics.clone(),
            exit_code: result.exit_code,
            command_fingerprint: result.command.clone(),
            file_fingerprints,
            tool_version,
            created_at_epoch_ms: util::now_epoch_ms()?,
        };
        if let Err(err) = store.store(&entry) {
            tracing::warn!(%err, "failed to persist cache entry");
        }
    }
    Ok(result)
}

fn tool_unavailable_result(
    engine: &dyn Engine,
    invocation: &ScheduledInvocation,
    detail: String,
) -> EngineResult {
    let command = format_command_line(
        engine.tool_name(),
        &engine.build_args(&invocation.plan),
    );
    EngineResult {
        engine_id: invocation.engine_id.clone(),
        mode: invocation.mode,
        command: command.clone(),
        exit_code: None,
        duration_ms: 0,
        cached: false,
        outcome: EngineOutcome::Failure(EngineError {
            engine_id: invocation.engine_id.clone(),
            mode: invocation.mode,
            kind: FailureKind::ToolNotFound,
            exit_code: None,
            command,
            working_dir: invocation.plan.working_dir.display().to_string(),
            stderr_excerpt: String::new(),
            detail: Some(detail),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builtin_registry;
    use std::fs;
    use std::path::Path;

    fn write_project(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.py"), b"x = 1\n").unwrap();
        fs::write(root.join("src/b.py"), b"y = 2\n").unwrap();
    }

    #[cfg(unix)]
    fn fake_mypy(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-mypy.sh");
        let script = concat!(
            "#!/bin/sh\n",
            "if [ \"$1\" = \"--version\" ]; then\n",
            "  echo 'mypy 1.11.2 (compiled: yes)'\n",
            "  exit 0\n",
            "fi\n",
            "printf '%s\\n' '{\"file\":\"src/a.py\",\"line\":1,\"column\":1,",
            "\"severity\":\"error\",\"message\":\"bad\",\"code\":\"name-defined\"}'\n",
            "echo 'Found 1 error in 1 file (checked 1 source file)'\n",
            "exit 1\n",
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn options(root: &Path, cache: &Path, tool: &Path) -> CheckOptions {
        let mut options = CheckOptions::new(root.to_path_buf());
        options.engines = Some(vec!["mypy".to_string()]);
        options.cache_dir = Some(cache.to_path_buf());
        options
            .tool_overrides
            .insert("mypy".to_string(), tool.to_path_buf());
        options
    }

    #[cfg(unix)]
    #[test]
    fn equivalent_modes_run_once_and_second_run_hits_cache() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        let tool = fake_mypy(scratch.path());
        let options = options(project.path(), &scratch.path().join("cache"), &tool);
        let registry = builtin_registry();

        let first = run_check(&options, &registry).unwrap();
        assert_eq!(first.engines.len(), 1, "equivalent plans collapse to full");
        assert_eq!(first.engines[0].mode, Mode::Full);
        assert_eq!(first.cache.misses, 1);
        assert_eq!(first.cache.hits, 0);
        match &first.engines[0].outcome {
            EngineOutcome::Diagnostics(diagnostics) => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].code.as_deref(), Some("name-defined"));
            }
            EngineOutcome::Failure(err) => panic!("unexpected failure: {err:?}"),
        }
        assert!(!first.partial_failure);

        let second = run_check(&options, &registry).unwrap();
        assert_eq!(second.cache.hits, 1);
        assert_eq!(second.cache.misses, 0);
        assert!(second.engines[0].cached);
        assert_eq!(second.engines[0].exit_code, first.engines[0].exit_code);
    }

    #[cfg(unix)]
    #[test]
    fn content_change_forces_a_miss() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        let tool = fake_mypy(scratch.path());
        let options = options(project.path(), &scratch.path().join("cache"), &tool);
        let registry = builtin_registry();

        run_check(&options, &registry).unwrap();
        // Same byte length, different content.
        fs::write(project.path().join("src/a.py"), b"x = 9\n").unwrap();
        let second = run_check(&options, &registry).unwrap();
        assert_eq!(second.cache.misses, 1);
    }

    #[cfg(unix)]
    #[test]
    fn cli_scope_narrows_current_but_not_full() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        fs::create_dir_all(project.path().join("docs")).unwrap();
        fs::write(project.path().join("docs/conf.py"), b"z = 3\n").unwrap();
        let tool = fake_mypy(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        options.cli_targets = Some(vec!["src".to_string()]);
        let registry = builtin_registry();

        let manifest = run_check(&options, &registry).unwrap();
        // CLI narrows current to src/ while full scans the whole root, so
        // the plans differ and both run, current first.
        assert_eq!(manifest.engines.len(), 2);
        assert_eq!(manifest.engines[0].mode, Mode::Current);
        assert_eq!(manifest.engines[1].mode, Mode::Full);
        assert_eq!(manifest.provenance["current"].targets, "cli");
        assert_eq!(manifest.provenance["full"].targets, "default");
    }

    #[cfg(unix)]
    #[test]
    fn exclude_pattern_and_unmatched_warning_flow() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        let tool = fake_mypy(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        options.cli_exclude = Some(vec!["b.py".to_string(), "nothing-here.py".to_string()]);
        let registry = builtin_registry();

        let manifest = run_check(&options, &registry).unwrap();
        let unmatched: Vec<&str> = manifest
            .warnings
            .iter()
            .filter_map(|warning| warning.pattern.as_deref())
            .collect();
        assert_eq!(unmatched, vec!["nothing-here.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn absolute_targets_reach_the_tool_unmodified() {
        let project = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let outside_root = outside.path().canonicalize().unwrap();
        fs::write(outside_root.join("x.py"), b"x = 1\n").unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let tool = fake_mypy(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        let target = outside_root.join("x.py").display().to_string();
        options.cli_targets = Some(vec![target.clone()]);
        options.allow_absolute = true;
        options.requested_modes = RequestedModes::CurrentOnly;

        let manifest = run_check(&options, &builtin_registry()).unwrap();
        assert_eq!(manifest.engines.len(), 1);
        // The tool runs with the declared root as cwd, so the argv entry must
        // stay absolute to address the real file.
        assert!(
            manifest.engines[0].command.contains(&target),
            "expected {} in {}",
            target,
            manifest.engines[0].command
        );
        match &manifest.engines[0].outcome {
            EngineOutcome::Diagnostics(diagnostics) => assert_eq!(diagnostics.len(), 1),
            EngineOutcome::Failure(err) => panic!("unexpected failure: {err:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exclude_matched_only_in_full_scope_does_not_warn() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        fs::create_dir_all(project.path().join("docs")).unwrap();
        fs::write(project.path().join("docs/conf.py"), b"z = 3\n").unwrap();
        let tool = fake_mypy(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        // docs/ matches nothing in the narrowed current scope but does match
        // in the full scan; the pattern did its job, so no warning.
        options.cli_targets = Some(vec!["src".to_string()]);
        options.cli_exclude = Some(vec!["docs/".to_string()]);
        let registry = builtin_registry();

        let manifest = run_check(&options, &registry).unwrap();
        assert!(manifest.warnings.is_empty());
    }

    #[test]
    fn unknown_engine_selection_is_fatal() {
        let project = tempfile::tempdir().unwrap();
        let mut options = CheckOptions::new(project.path().to_path_buf());
        options.engines = Some(vec!["flow".to_string()]);
        assert!(run_check(&options, &builtin_registry()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_run_schedules_no_invocations() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        let tool = fake_mypy(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        let cancel = Arc::new(AtomicBool::new(true));
        options.cancel = Some(cancel);
        let manifest = run_check(&options, &builtin_registry()).unwrap();
        assert!(manifest.aborted);
        assert!(manifest.engines.is_empty());
    }

    #[cfg(unix)]
    fn sleeping_tool(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("sleeping-tool.sh");
        let script = concat!(
            "#!/bin/sh\n",
            "if [ \"$1\" = \"--version\" ]; then\n",
            "  echo 'mypy 1.11.2'\n",
            "  exit 0\n",
            "fi\n",
            "sleep 30\n",
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_terminates_an_in_flight_invocation() {
        let project = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        write_project(project.path());
        let tool = sleeping_tool(scratch.path());
        let mut options = options(project.path(), &scratch.path().join("cache"), &tool);
        let cancel = Arc::new(AtomicBool::new(false));
        options.cancel = Some(cancel.clone());

        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            cancel.store(true, Ordering::SeqCst);
        });
        let started = std::time::Instant::now();
        let manifest = run_check(&options, &builtin_registry()).unwrap();
        trigger.join().unwrap();

        assert!(manifest.aborted);
        assert!(manifest.engines.is_empty(), "partial result must be discarded");
        assert!(
            started.elapsed() < Duration::from_secs(20),
            "the in-flight tool must be killed, not awaited"
        );
    }
}
