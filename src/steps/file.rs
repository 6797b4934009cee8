//! Whole-file configuration resources
//!
//! The file's contents are owned by postinst: any drift is overwritten,
//! unless the step is marked `preserve`, in which case an existing file is
//! left alone. Dry runs show a unified diff of what would change.

use anyhow::Result;
use planned::{ApplyContext, Privilege, Step};
use std::fs;
use std::path::PathBuf;

use super::{Ownership, create_dirs, current_mode, set_mode, write_atomic};

#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub label: String,
    pub contents: String,
    pub mode: Option<u32>,
    pub preserve: bool,
    pub owner: Ownership,
}

/// What differs between the file on disk and the desired one
#[derive(Debug, Clone, PartialEq, Eq)]
enum Drift {
    None,
    Missing,
    Contents(String),
    Mode { actual: Option<u32>, wanted: u32 },
}

impl ConfigFile {
    fn drift(&self) -> Drift {
        let Ok(existing) = fs::read(&self.path) else {
            return Drift::Missing;
        };
        if self.preserve {
            return Drift::None;
        }
        if existing != self.contents.as_bytes() {
            return Drift::Contents(String::from_utf8_lossy(&existing).into_owned());
        }
        match self.mode {
            Some(wanted) if current_mode(&self.path) != Some(wanted) => Drift::Mode {
                actual: current_mode(&self.path),
                wanted,
            },
            _ => Drift::None,
        }
    }
}

/// Unified diff between two texts, labelled with the file's path
fn unified_diff(old: &str, new: &str, label: &str) -> String {
    similar::TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("{label} (current)"), &format!("{label} (planned)"))
        .to_string()
}

impl Step for ConfigFile {
    fn name(&self) -> String {
        format!("file:{}", self.label)
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn description(&self) -> String {
        format!("Write {}", self.label)
    }

    fn preview(&self) -> String {
        match self.drift() {
            Drift::None => format!("{} is up to date", self.label),
            Drift::Missing => format!(
                "create {} ({} lines)",
                self.label,
                self.contents.lines().count()
            ),
            Drift::Contents(old) => format!(
                "rewrite {}\n{}",
                self.label,
                unified_diff(&old, &self.contents, &self.label).trim_end()
            ),
            Drift::Mode { actual, wanted } => match actual {
                Some(actual) => format!("chmod {wanted:o} {} (currently {actual:o})", self.label),
                None => format!("chmod {wanted:o} {}", self.label),
            },
        }
    }

    fn privilege(&self) -> Privilege {
        self.owner.privilege()
    }

    fn check(&self) -> Result<bool> {
        Ok(self.drift() == Drift::None)
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_dirs(parent, &self.owner)?;
        }

        write_atomic(&self.path, self.contents.as_bytes())?;
        if let Some(mode) = self.mode {
            set_mode(&self.path, mode)?;
        }
        self.owner.apply(&self.path)
    }
}
