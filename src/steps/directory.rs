use anyhow::Result;
use planned::{ApplyContext, Privilege, Step};
use std::path::PathBuf;

use super::{Ownership, create_dirs, current_mode, set_mode};

/// A directory that should exist, optionally with fixed permissions
#[derive(Debug, Clone)]
pub struct Directory {
    pub path: PathBuf,
    /// How the path is shown to the user (`~/go/bin`)
    pub label: String,
    pub mode: Option<u32>,
    pub owner: Ownership,
}

impl Step for Directory {
    fn name(&self) -> String {
        format!("directory:{}", self.label)
    }

    fn kind(&self) -> &'static str {
        "directory"
    }

    fn description(&self) -> String {
        format!("Create directory {}", self.label)
    }

    fn preview(&self) -> String {
        match self.mode {
            Some(mode) => format!("mkdir -p -m {mode:o} {}", self.path.display()),
            None => format!("mkdir -p {}", self.path.display()),
        }
    }

    fn privilege(&self) -> Privilege {
        self.owner.privilege()
    }

    fn check(&self) -> Result<bool> {
        if !self.path.is_dir() {
            return Ok(false);
        }
        Ok(self.mode.is_none_or(|m| current_mode(&self.path) == Some(m)))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        if self.path.exists() && !self.path.is_dir() {
            anyhow::bail!("{} exists and is not a directory", self.path.display());
        }
        create_dirs(&self.path, &self.owner)?;
        if let Some(mode) = self.mode {
            set_mode(&self.path, mode)?;
        }
        Ok(())
    }
}
