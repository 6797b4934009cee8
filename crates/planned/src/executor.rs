//! Execution engine - runs a plan step by step in the chosen mode

use crate::context::{ApplyContext, NoProgress, ProgressCallback, find_in_path};
use crate::error::StepError;
use crate::planner::Plan;
use crate::step::Step;
use crate::types::{ExecutionLog, ExecutionMode, LogEntry, Outcome};

/// Options for a run
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Apply for real, or only report
    pub mode: ExecutionMode,
    /// Verbose output, forwarded to every action
    pub verbose: bool,
}

impl ExecuteOptions {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            verbose: false,
        }
    }
}

/// Execute a plan, strictly in order
///
/// Every step ends in exactly one terminal outcome. A failing step never
/// stops the run and nothing is rolled back.
///
/// # Arguments
/// * `plan` - The steps to handle, in order
/// * `opts` - Mode and verbosity
/// * `progress` - Progress callback
///
/// # Returns
/// The execution log, one entry per step
pub fn execute<P: ProgressCallback>(
    plan: &Plan,
    opts: ExecuteOptions,
    progress: &mut P,
) -> ExecutionLog {
    let mut log = ExecutionLog::new(opts.mode);
    progress.on_run_start(plan.len(), opts.mode);

    for (index, step) in plan.iter().enumerate() {
        progress.on_step_start(index, step.as_ref());
        let entry = run_step(step.as_ref(), opts, progress);
        progress.on_step_complete(&entry);
        log.push(entry);
    }

    progress.on_run_complete(&log);
    log
}

/// Execute a plan without progress reporting
pub fn execute_simple(plan: &Plan, mode: ExecutionMode) -> ExecutionLog {
    execute(plan, ExecuteOptions::new(mode), &mut NoProgress)
}

/// Handle a single step
fn run_step<P: ProgressCallback>(
    step: &dyn Step,
    opts: ExecuteOptions,
    progress: &mut P,
) -> LogEntry {
    let name = step.name();
    let mut entry = LogEntry {
        step: name.clone(),
        kind: step.kind().to_string(),
        outcome: Outcome::Skipped,
        warnings: Vec::new(),
    };

    match step.check() {
        Ok(true) => {
            log::debug!("{name}: already satisfied");
            return entry;
        }
        Ok(false) => {}
        Err(e) => {
            let err = StepError::check(&e);
            log::debug!("{name}: {err}");
            entry.outcome = Outcome::Failed {
                reason: err.to_string(),
            };
            return entry;
        }
    }

    for tool in step.prerequisites() {
        if find_in_path(&tool).is_none() {
            let warning = StepError::ConfigurationMissing { tool }.to_string();
            progress.on_warning(&name, &warning);
            entry.warnings.push(warning);
        }
    }

    entry.outcome = match opts.mode {
        ExecutionMode::Simulate => Outcome::Simulated {
            plan: step.preview(),
        },
        ExecutionMode::Apply => {
            let mut ctx = ApplyContext::new(opts.verbose);
            let result = step.apply(&mut ctx);
            for warning in ctx.into_warnings() {
                progress.on_warning(&name, &warning);
                entry.warnings.push(warning);
            }
            match result {
                Ok(()) => Outcome::Applied,
                Err(e) => Outcome::Failed {
                    reason: StepError::action(&e).to_string(),
                },
            }
        }
    };

    log::debug!("{name}: {}", entry.outcome.label());
    entry
}
