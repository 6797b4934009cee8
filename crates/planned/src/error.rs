//! Error types for step execution.
//!
//! None of these abort a run. The executor turns each one into either a
//! `Failed` outcome or a warning on the step's log entry.

use thiserror::Error;

/// Problems encountered while handling a single step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The idempotency check itself could not be evaluated
    #[error("check failed: {0}")]
    CheckFailed(String),

    /// The action ran and reported an error
    #[error("{0}")]
    ActionFailed(String),

    /// A tool the step relies on is not installed
    #[error("prerequisite `{tool}` not found on PATH")]
    ConfigurationMissing {
        /// Name of the missing executable
        tool: String,
    },
}

impl StepError {
    /// Build a check failure from any error, keeping its context chain
    pub fn check(err: &anyhow::Error) -> Self {
        Self::CheckFailed(format!("{err:#}"))
    }

    /// Build an action failure from any error, keeping its context chain
    pub fn action(err: &anyhow::Error) -> Self {
        Self::ActionFailed(format!("{err:#}"))
    }

    /// Whether this error ends the step as `Failed` rather than a warning
    pub fn is_fatal_to_step(&self) -> bool {
        !matches!(self, Self::ConfigurationMissing { .. })
    }
}
