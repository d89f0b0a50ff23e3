//! Plan equivalence and per-engine scheduling.
//!
//! When both scan modes are requested the scheduler compares the current and
//! full plans for one engine; equivalent plans collapse to the full mode only,
//! which is the canonical, ratchet-eligible result. Comparison is robust to
//! input-ordering differences in targets (already canonicalized) but treats
//! argument order as significant unless the engine declares otherwise.
use crate::paths::Mode;
use crate::plan::{ConfigError, EnginePlan, PlanOutcome};
use serde::{Deserialize, Serialize};

/// Which scan modes the run asked for.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestedModes {
    CurrentOnly,
    FullOnly,
    Both,
}

impl RequestedModes {
    pub fn wants(self, mode: Mode) -> bool {
        match self {
            RequestedModes::CurrentOnly => mode == Mode::Current,
            RequestedModes::FullOnly => mode == Mode::Full,
            RequestedModes::Both => true,
        }
    }
}

/// One scheduled engine invocation. The plan is immutable once scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInvocation {
    pub engine_id: String,
    pub mode: Mode,
    pub plan: EnginePlan,
}

/// The ordered execution list for a run, plus per-engine configuration
/// errors. Execution may not alter it.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub invocations: Vec<ScheduledInvocation>,
    pub config_errors: Vec<ConfigError>,
}

/// Canonical equivalence between two plans for the same engine. The mode tag
/// itself is excluded: the question is whether the effective inputs match.
pub fn plans_equivalent(
    current: &EnginePlan,
    full: &EnginePlan,
    order_insensitive_flags: &[&str],
) -> bool {
    current.engine_id == full.engine_id
        && current.resolved_targets == full.resolved_targets
        && current.config_selection == full.config_selection
        && current.enabled == full.enabled
        && current.profile == full.profile
        && current.engine_env == full.engine_env
        && current.working_dir == full.working_dir
        && current.comparable_args(order_insensitive_flags)
            == full.comparable_args(order_insensitive_flags)
}

/// Schedule one engine. Returns the invocations to append (in execution
/// order) or the engine's configuration error.
pub fn schedule_engine(
    requested: RequestedModes,
    current: Option<PlanOutcome>,
    full: Option<PlanOutcome>,
    order_insensitive_flags: &[&str],
) -> (Vec<ScheduledInvocation>, Option<ConfigError>) {
    // A deselected engine produces zero invocations regardless of mode.
    for outcome in [&current, &full].into_iter().flatten() {
        if let PlanOutcome::Deselected(err) = outcome {
            return (Vec::new(), Some(err.clone()));
        }
    }
    let current = match current {
        Some(PlanOutcome::Plan(plan)) => Some(plan),
        _ => None,
    };
    let full = match full {
        Some(PlanOutcome::Plan(plan)) => Some(plan),
        _ => None,
    };

    let mut invocations = Vec::new();
    match requested {
        RequestedModes::CurrentOnly => {
            if let Some(plan) = current {
                push_enabled(&mut invocations, plan);
            }
        }
        RequestedModes::FullOnly => {
            if let Some(plan) = full {
                push_enabled(&mut invocations, plan);
            }
        }
        RequestedModes::Both => match (current, full) {
            (Some(current), Some(full)) => {
                if plans_equivalent(&current, &full, order_insensitive_flags) {
                    tracing::debug!(
                        engine = %full.engine_id,
                        "current and full plans equivalent; scheduling full only"
                    );
                    push_enabled(&mut invocations, full);
                } else {
                    push_enabled(&mut invocations, current);
                    push_enabled(&mut invocations, full);
                }
            }
            (Some(plan), None) | (None, Some(plan)) => push_enabled(&mut invocations, plan),
            (None, None) => {}
        },
    }
    (invocations, None)
}

fn push_enabled(invocations: &mut Vec<ScheduledInvocation>, plan: EnginePlan) {
    if !plan.enabled {
        tracing::debug!(engine = %plan.engine_id, "engine disabled; skipping");
        return;
    }
    if plan.resolved_targets.is_empty() {
        // No files in scope is not an error, but an empty target list must
        // never reach an external tool.
        tracing::debug!(engine = %plan.engine_id, mode = plan.mode.as_str(), "no targets; skipping");
        return;
    }
    invocations.push(ScheduledInvocation {
        engine_id: plan.engine_id.clone(),
        mode: plan.mode,
        plan,
    });
}
