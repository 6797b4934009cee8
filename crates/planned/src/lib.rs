//! # Planned
//!
//! Ordered, idempotent setup steps that are either applied or simulated.
//!
//! Every mutating action sits behind one dispatcher. The dispatcher runs
//! each step's read-only check first and only then, depending on the
//! [`ExecutionMode`], invokes the action or records what it would do.
//!
//! ## Core Concepts
//!
//! - **Step**: a check ("already satisfied?") plus the action that satisfies it
//! - **Plan**: the explicit, ordered list of steps
//! - **ExecutionMode**: `Apply` or `Simulate`, chosen once per run
//! - **ExecutionLog**: one terminal outcome per step, in order
//!
//! ## Example
//!
//! ```ignore
//! use planned::{execute_simple, ExecutionMode, FnStep, Outcome, Plan};
//!
//! let plan = Plan::new()
//!     .with_step(FnStep::new(
//!         "dir:/opt/tools",
//!         || Ok(std::path::Path::new("/opt/tools").is_dir()),
//!         |_| Ok(std::fs::create_dir_all("/opt/tools")?),
//!     ));
//!
//! let log = execute_simple(&plan, ExecutionMode::Simulate);
//! assert!(matches!(log.entries[0].outcome, Outcome::Simulated { .. } | Outcome::Skipped));
//! ```
//!
//! ## Guarantees
//!
//! - In simulate mode no action is ever called.
//! - A satisfied step is skipped in both modes.
//! - A failed step is recorded and the run moves on; nothing is rolled back.

pub mod context;
pub mod error;
pub mod executor;
pub mod planner;
pub mod step;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback, find_in_path};
pub use error::StepError;
pub use executor::{ExecuteOptions, execute, execute_simple};
pub use planner::Plan;
pub use step::{BoxedStep, FnStep, Step};
pub use types::{ExecutionLog, ExecutionMode, LogEntry, Outcome, Privilege, Summary};
