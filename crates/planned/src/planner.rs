//! Execution plan - the explicit, ordered list of steps

use crate::step::{BoxedStep, Step};
use crate::types::Privilege;

/// An ordered list of steps
///
/// Order is significant: steps run exactly in the order they were pushed.
#[derive(Debug, Default)]
pub struct Plan {
    steps: Vec<BoxedStep>,
}

impl Plan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step to the end of the plan
    pub fn push(&mut self, step: BoxedStep) {
        self.steps.push(step);
    }

    /// Append a step, builder style
    pub fn with_step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoxedStep> {
        self.steps.iter()
    }

    /// Step names in execution order
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Total number of steps in the plan
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if any step needs system privileges
    pub fn has_privileged(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.privilege() == Privilege::System)
    }

    /// Keep only the steps matching a predicate, preserving order
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Step) -> bool,
    {
        Self {
            steps: self
                .steps
                .into_iter()
                .filter(|s| predicate(s.as_ref()))
                .collect(),
        }
    }

    /// Keep only the steps matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|s| matches_filter(s, kind.as_deref(), name.as_deref()))
            }
        }
    }
}

/// Parse a target string like "kind.name" into (kind, name)
///
/// Only the first dot separates; names such as "apt.python3.11" keep theirs.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) if !kind.is_empty() => {
            (Some(kind.to_string()), Some(name.to_string()))
        }
        Some(_) => (None, Some(target.trim_start_matches('.').to_string())),
    }
}

/// Check if a step matches the filter criteria
fn matches_filter(step: &dyn Step, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind {
        // Allow common aliases
        let matches_kind = match k {
            "packages" => step.kind() == "apt" || step.kind() == "apt_update",
            "files" => step.kind() == "file",
            "services" => step.kind() == "service",
            "repos" => step.kind() == "git",
            _ => step.kind() == k,
        };
        if !matches_kind {
            return false;
        }
    }

    if let Some(n) = name
        && !step.name().contains(n)
    {
        return false;
    }

    true
}
