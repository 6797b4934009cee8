//! Step trait for planned mutations
//!
//! A Step pairs a read-only idempotency check with the action that makes
//! the check pass.

use crate::context::ApplyContext;
use crate::types::Privilege;
use anyhow::Result;
use std::fmt;

/// Core trait for setup steps
///
/// Every step in the system implements this trait, which provides:
/// - Identity (name, kind, description)
/// - Idempotency detection (check)
/// - The mutation itself (apply)
/// - Privilege and tool requirements
///
/// # Example
///
/// ```ignore
/// use planned::{ApplyContext, Step};
///
/// #[derive(Debug)]
/// struct Motd { text: String }
///
/// impl Step for Motd {
///     fn name(&self) -> String { "file:/etc/motd".into() }
///     fn kind(&self) -> &'static str { "file" }
///     fn description(&self) -> String { "Write /etc/motd".into() }
///
///     fn check(&self) -> anyhow::Result<bool> {
///         Ok(std::fs::read_to_string("/etc/motd").is_ok_and(|c| c == self.text))
///     }
///
///     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<()> {
///         std::fs::write("/etc/motd", &self.text)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Step: fmt::Debug {
    /// Unique, stable name for this step
    ///
    /// Examples:
    /// - "apt:tmux"
    /// - "file:~/.tmux.conf"
    /// - "go:kerbrute"
    fn name(&self) -> String;

    /// Step kind, used for grouping and `--only` filtering
    fn kind(&self) -> &'static str;

    /// Human-readable description of what the action does
    fn description(&self) -> String;

    /// What would run, as reported in simulate mode
    ///
    /// Defaults to the description. Must not have side effects.
    fn preview(&self) -> String {
        self.description()
    }

    fn privilege(&self) -> Privilege {
        Privilege::User
    }

    /// Executables the action needs on `PATH`
    fn prerequisites(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the step is already satisfied
    ///
    /// Runs in both modes, so it must be read-only.
    fn check(&self) -> Result<bool>;

    /// Perform the mutation
    ///
    /// Only called in apply mode, and only when `check` returned false.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<()>;
}

/// A boxed step for type-erased storage
pub type BoxedStep = Box<dyn Step>;

type CheckFn = Box<dyn Fn() -> Result<bool>>;
type ActionFn = Box<dyn Fn(&mut ApplyContext) -> Result<()>>;

/// A step built from a pair of closures
///
/// Useful for one-off steps that do not deserve their own type.
pub struct FnStep {
    name: String,
    kind: &'static str,
    description: Option<String>,
    privilege: Privilege,
    prerequisites: Vec<String>,
    check: CheckFn,
    action: ActionFn,
}

impl FnStep {
    pub fn new<C, A>(name: impl Into<String>, check: C, action: A) -> Self
    where
        C: Fn() -> Result<bool> + 'static,
        A: Fn(&mut ApplyContext) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            kind: "fn",
            description: None,
            privilege: Privilege::User,
            prerequisites: Vec::new(),
            check: Box::new(check),
            action: Box::new(action),
        }
    }

    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_prerequisite(mut self, tool: impl Into<String>) -> Self {
        self.prerequisites.push(tool.into());
        self
    }
}

impl fmt::Debug for FnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Step for FnStep {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Run {}", self.name))
    }

    fn privilege(&self) -> Privilege {
        self.privilege
    }

    fn prerequisites(&self) -> Vec<String> {
        self.prerequisites.clone()
    }

    fn check(&self) -> Result<bool> {
        (self.check)()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        (self.action)(ctx)
    }
}
