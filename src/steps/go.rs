use anyhow::Result;
use planned::{ApplyContext, Privilege, Step, find_in_path};
use std::path::PathBuf;
use std::process::Command;

use super::{Ownership, create_dirs};
use crate::runner;
use crate::user::TargetUser;

/// Where distro and upstream Go toolchains live when `go` isn't on PATH
const FALLBACK_GO: &[&str] = &["/usr/local/go/bin/go", "/usr/lib/go/bin/go"];

/// A Go program installed with `go install` into the target user's GOPATH
#[derive(Debug, Clone)]
pub struct GoInstall {
    pub package: String,
    pub binary: String,
    pub user: TargetUser,
}

impl GoInstall {
    pub fn new(package: &str, binary: Option<&str>, user: &TargetUser) -> Self {
        Self {
            package: package.to_string(),
            binary: binary.map_or_else(|| binary_name(package), str::to_string),
            user: user.clone(),
        }
    }

    fn gobin(&self) -> PathBuf {
        self.user.gopath().join("bin")
    }

    fn install_command(&self, go: &str) -> Command {
        let mut cmd = runner::command(go, ["install", self.package.as_str()]);
        runner::as_user(&mut cmd, &self.user);
        cmd.env("GOPATH", self.user.gopath());
        cmd
    }
}

/// Binary name `go install` produces for a package path
///
/// The last path element, ignoring `@version` and a major-version suffix
/// like `/v2`.
fn binary_name(package: &str) -> String {
    let path = package.split('@').next().unwrap_or(package);
    let mut elements = path.trim_end_matches('/').rsplit('/');
    let last = elements.next().unwrap_or(path);

    let is_major_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        elements.next().unwrap_or(last).to_string()
    } else {
        last.to_string()
    }
}

impl Step for GoInstall {
    fn name(&self) -> String {
        format!("go:{}", self.binary)
    }

    fn kind(&self) -> &'static str {
        "go"
    }

    fn description(&self) -> String {
        format!("Install {} with go install", self.binary)
    }

    fn preview(&self) -> String {
        format!(
            "GOPATH={} {}",
            self.user.gopath().display(),
            runner::display(&self.install_command("go"))
        )
    }

    fn privilege(&self) -> Privilege {
        Privilege::User
    }

    fn prerequisites(&self) -> Vec<String> {
        vec!["go".to_string()]
    }

    fn check(&self) -> Result<bool> {
        Ok(self.gobin().join(&self.binary).is_file() || find_in_path(&self.binary).is_some())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        let go = if find_in_path("go").is_some() {
            "go".to_string()
        } else if let Some(fallback) = FALLBACK_GO.iter().find(|p| find_in_path(p).is_some()) {
            ctx.warn(format!("go not on PATH, using {fallback}"));
            (*fallback).to_string()
        } else {
            anyhow::bail!("go toolchain not found");
        };

        create_dirs(&self.gobin(), &Ownership::for_path(&self.gobin(), &self.user))?;
        runner::run_step_command(&mut self.install_command(&go), ctx.verbose)
    }
}
