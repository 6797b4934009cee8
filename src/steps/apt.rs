//! apt resources - package list refresh and package installation

use anyhow::{Context, Result};
use planned::{ApplyContext, Privilege, Step};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, SystemTime};

use super::{Ownership, create_dirs, modified};
use crate::runner;

const SOURCES_LIST: &str = "/etc/apt/sources.list";
const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// Refresh apt's package lists
///
/// Satisfied while our stamp is younger than `max_age` and newer than every
/// apt source file, so adding a repository triggers a fresh update.
#[derive(Debug, Clone)]
pub struct AptUpdate {
    pub stamp: PathBuf,
    pub max_age: Duration,
    pub sources: Vec<PathBuf>,
    /// 1 for the first refresh in a plan, 2 for the next, and so on
    pub pass: usize,
}

impl AptUpdate {
    pub fn new(stamp: PathBuf, max_age_hours: u64) -> Self {
        Self {
            stamp,
            max_age: Duration::from_secs(max_age_hours.saturating_mul(3600)),
            sources: vec![PathBuf::from(SOURCES_LIST), PathBuf::from(SOURCES_DIR)],
            pass: 1,
        }
    }

    /// Number this refresh so repeated updates keep distinct names
    pub const fn with_pass(mut self, pass: usize) -> Self {
        self.pass = pass;
        self
    }

    /// Newest modification time among the source files and directories
    fn newest_source(&self) -> Option<SystemTime> {
        let mut newest = None;
        for source in &self.sources {
            newest = newest.max(modified(source));
            if source.is_dir()
                && let Ok(entries) = fs::read_dir(source)
            {
                for entry in entries.flatten() {
                    newest = newest.max(modified(&entry.path()));
                }
            }
        }
        newest
    }
}

/// Decide whether lists refreshed at `stamp` are still current
fn is_fresh(
    stamp: Option<SystemTime>,
    newest_source: Option<SystemTime>,
    max_age: Duration,
    now: SystemTime,
) -> bool {
    let Some(stamp) = stamp else {
        return false;
    };
    if newest_source.is_some_and(|s| s > stamp) {
        return false;
    }
    now.duration_since(stamp).map(|age| age < max_age).unwrap_or(true)
}

impl Step for AptUpdate {
    fn name(&self) -> String {
        if self.pass > 1 {
            format!("apt_update#{}", self.pass)
        } else {
            "apt_update".to_string()
        }
    }

    fn kind(&self) -> &'static str {
        "apt_update"
    }

    fn description(&self) -> String {
        "Refresh apt package lists".to_string()
    }

    fn preview(&self) -> String {
        "apt-get update".to_string()
    }

    fn privilege(&self) -> Privilege {
        Privilege::System
    }

    fn prerequisites(&self) -> Vec<String> {
        vec!["apt-get".to_string()]
    }

    fn check(&self) -> Result<bool> {
        Ok(is_fresh(
            modified(&self.stamp),
            self.newest_source(),
            self.max_age,
            SystemTime::now(),
        ))
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        let mut cmd = runner::command("apt-get", ["update"]);
        cmd.env("DEBIAN_FRONTEND", "noninteractive");
        runner::run_step_command(&mut cmd, ctx.verbose)?;

        if let Some(parent) = self.stamp.parent() {
            create_dirs(parent, &Ownership::system())?;
        }
        fs::write(&self.stamp, b"")
            .with_context(|| format!("Failed to touch {}", self.stamp.display()))
    }
}

/// A single Debian package
#[derive(Debug, Clone)]
pub struct AptPackage {
    pub name: String,
}

impl AptPackage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    fn install_command(&self) -> Command {
        let mut cmd = runner::command("apt-get", ["install", "-y", self.name.as_str()]);
        cmd.env("DEBIAN_FRONTEND", "noninteractive");
        cmd
    }
}

/// Whether `dpkg-query -f '${Status}'` output means installed
fn is_installed_status(status: &str) -> bool {
    let mut words = status.split_whitespace();
    matches!(
        (words.next(), words.next(), words.next()),
        (Some("install" | "hold"), Some("ok"), Some("installed"))
    )
}

impl Step for AptPackage {
    fn name(&self) -> String {
        format!("apt:{}", self.name)
    }

    fn kind(&self) -> &'static str {
        "apt"
    }

    fn description(&self) -> String {
        format!("Install {} via apt", self.name)
    }

    fn preview(&self) -> String {
        runner::display(&self.install_command())
    }

    fn privilege(&self) -> Privilege {
        Privilege::System
    }

    fn prerequisites(&self) -> Vec<String> {
        vec!["apt-get".to_string(), "dpkg-query".to_string()]
    }

    fn check(&self) -> Result<bool> {
        let output = match Command::new("dpkg-query")
            .args(["-W", "-f=${Status}", self.name.as_str()])
            .output()
        {
            Ok(output) => output,
            // Reported as a missing prerequisite instead
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).context("Failed to run dpkg-query"),
        };

        // Unknown packages make dpkg-query exit 1; that just means "absent"
        if !output.status.success() {
            return Ok(false);
        }
        Ok(is_installed_status(&String::from_utf8_lossy(&output.stdout)))
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        runner::run_step_command(&mut self.install_command(), ctx.verbose)
    }
}
