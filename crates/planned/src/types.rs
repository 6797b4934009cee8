//! Core types for planned mutations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether actions take real effect or are only reported
///
/// Chosen once per run and passed explicitly to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run every unsatisfied step's action
    Apply,
    /// Report what would run, never invoke an action
    Simulate,
}

impl ExecutionMode {
    /// Resolve the mode from the two CLI switches
    ///
    /// Apply wins when both are set. Returns `None` when neither is.
    pub fn from_flags(run: bool, dry_run: bool) -> Option<Self> {
        match (run, dry_run) {
            (true, _) => Some(Self::Apply),
            (false, true) => Some(Self::Simulate),
            (false, false) => None,
        }
    }

    pub fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Simulate => write!(f, "simulate"),
        }
    }
}

/// Privilege level a step needs to take effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Touches only the target user's files
    #[default]
    User,
    /// Touches system state (packages, /etc, services)
    System,
}

/// Terminal outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Check reported the step as already satisfied
    Skipped,
    /// Simulate mode: the action was described, not run
    Simulated { plan: String },
    /// The action ran and succeeded
    Applied,
    /// The check or the action failed
    Failed { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short lowercase label, used in listings and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Simulated { .. } => "simulated",
            Self::Applied => "applied",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One line of the execution log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Step name, as matched by `--only`
    pub step: String,
    /// Step kind, e.g. "apt" or "file"
    pub kind: String,
    pub outcome: Outcome,
    /// Non-fatal problems noticed while handling the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Ordered record of what happened to every step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub mode: ExecutionMode,
    pub entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outcomes in step order
    pub fn outcomes(&self) -> Vec<&Outcome> {
        self.entries.iter().map(|e| &e.outcome).collect()
    }

    /// Find the entry for a step by name
    pub fn entry(&self, step: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.step == step)
    }

    /// Entries that ended in failure
    pub fn failures(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.entries {
            summary.add(entry);
        }
        summary
    }
}

/// Outcome counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub skipped: usize,
    pub simulated: usize,
    pub applied: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn add(&mut self, entry: &LogEntry) {
        match entry.outcome {
            Outcome::Skipped => self.skipped += 1,
            Outcome::Simulated { .. } => self.simulated += 1,
            Outcome::Applied => self.applied += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
        self.warnings += entry.warnings.len();
    }

    /// Total number of steps handled
    pub fn total(&self) -> usize {
        self.skipped + self.simulated + self.applied + self.failed
    }

    /// Check if the run had no failures
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
