//! Apply context and progress reporting
//!
//! These let the planned crate drive a run without depending on a
//! particular terminal UI.

use crate::step::Step;
use crate::types::{ExecutionLog, ExecutionMode, LogEntry};
use std::path::PathBuf;

/// Progress callback for a run
///
/// Implement this trait to receive updates while steps are handled.
pub trait ProgressCallback {
    /// Called once before the first step
    fn on_run_start(&mut self, total: usize, mode: ExecutionMode);

    /// Called before a step's check is evaluated (`index` is zero-based)
    fn on_step_start(&mut self, index: usize, step: &dyn Step);

    /// Called for every non-fatal problem, as soon as it is noticed
    fn on_warning(&mut self, step: &str, warning: &str);

    /// Called with the finished log entry for a step
    fn on_step_complete(&mut self, entry: &LogEntry);

    /// Called once after the last step
    fn on_run_complete(&mut self, log: &ExecutionLog);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _total: usize, _mode: ExecutionMode) {}
    fn on_step_start(&mut self, _index: usize, _step: &dyn Step) {}
    fn on_warning(&mut self, _step: &str, _warning: &str) {}
    fn on_step_complete(&mut self, _entry: &LogEntry) {}
    fn on_run_complete(&mut self, _log: &ExecutionLog) {}
}

/// Context passed to a step's action
///
/// Only ever constructed in apply mode.
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
    warnings: Vec<String>,
}

impl ApplyContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            warnings: Vec::new(),
        }
    }

    /// Record a non-fatal problem; it ends up on the step's log entry
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

/// Locate an executable on `PATH`
///
/// Names containing a slash are checked as paths directly.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    which::which(tool).ok()
}
