use anyhow::{Context, Result, bail};
use planned::{ApplyContext, Privilege, Step};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Ownership, create_dirs};
use crate::runner;

/// A repository cloned into a fixed destination
#[derive(Debug, Clone)]
pub struct GitClone {
    pub url: String,
    pub dest: PathBuf,
    pub label: String,
    pub branch: Option<String>,
    pub depth: Option<u32>,
    pub owner: Ownership,
}

impl GitClone {
    fn clone_command(&self) -> Command {
        let mut cmd = runner::command("git", ["clone", "--quiet"]);
        if let Some(depth) = self.depth {
            cmd.arg("--depth").arg(depth.to_string());
        }
        if let Some(branch) = &self.branch {
            cmd.arg("--branch").arg(branch);
        }
        cmd.arg(&self.url).arg(&self.dest);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        if let Some(user) = self.owner.user() {
            runner::as_user(&mut cmd, user);
        }
        cmd
    }

    /// Short name of the repository, e.g. `impacket`
    pub fn repo_name(&self) -> &str {
        let trimmed = self.url.trim_end_matches('/');
        let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last)
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

impl Step for GitClone {
    fn name(&self) -> String {
        format!("git:{}", self.repo_name())
    }

    fn kind(&self) -> &'static str {
        "git"
    }

    fn description(&self) -> String {
        format!("Clone {} into {}", self.url, self.label)
    }

    fn preview(&self) -> String {
        runner::display(&self.clone_command())
    }

    fn privilege(&self) -> Privilege {
        self.owner.privilege()
    }

    fn prerequisites(&self) -> Vec<String> {
        vec!["git".to_string()]
    }

    fn check(&self) -> Result<bool> {
        Ok(self.dest.join(".git").exists())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        if self.dest.exists() && !is_empty_dir(&self.dest) {
            bail!(
                "{} exists and is not a git repository; refusing to clone over it",
                self.dest.display()
            );
        }

        let parent = self
            .dest
            .parent()
            .with_context(|| format!("No parent directory for {}", self.dest.display()))?;
        create_dirs(parent, &self.owner)?;

        runner::run_step_command(&mut self.clone_command(), ctx.verbose)
    }
}
