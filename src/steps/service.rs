use anyhow::{Context, Result};
use planned::{ApplyContext, Privilege, Step};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::modified;
use crate::runner;

/// A systemd unit that must be running with its current configuration
///
/// Satisfied when the unit is active and started after every watched file
/// was last modified.
#[derive(Debug, Clone)]
pub struct ServiceRestart {
    pub unit: String,
    pub watch: Vec<PathBuf>,
}

/// Parse `ActiveEnterTimestamp=@1712345678` from `systemctl show --timestamp=unix`
fn parse_active_enter(output: &str) -> Option<SystemTime> {
    let value = output
        .lines()
        .find_map(|l| l.trim().strip_prefix("ActiveEnterTimestamp="))?;
    let secs: u64 = value.trim().strip_prefix('@')?.parse().ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

/// Whether a unit started at `started` has seen every watched change
///
/// Timestamps only have second resolution, so a file touched in the same
/// second the unit started counts as seen.
fn started_after_changes(started: SystemTime, changes: &[SystemTime]) -> bool {
    let started = started + Duration::from_secs(1);
    changes.iter().all(|changed| *changed < started)
}

impl ServiceRestart {
    fn started_at(&self) -> Result<Option<SystemTime>> {
        let out = runner::run_capture(
            "systemctl",
            &[
                "show",
                "--property=ActiveEnterTimestamp",
                "--timestamp=unix",
                self.unit.as_str(),
            ],
        )
        .with_context(|| format!("Failed to query {}", self.unit))?;
        Ok(parse_active_enter(&out))
    }
}

impl Step for ServiceRestart {
    fn name(&self) -> String {
        format!("service:{}", self.unit)
    }

    fn kind(&self) -> &'static str {
        "service"
    }

    fn description(&self) -> String {
        format!("Restart {}", self.unit)
    }

    fn preview(&self) -> String {
        format!("systemctl restart {}", self.unit)
    }

    fn privilege(&self) -> Privilege {
        Privilege::System
    }

    fn prerequisites(&self) -> Vec<String> {
        vec!["systemctl".to_string()]
    }

    fn check(&self) -> Result<bool> {
        if !runner::run_quiet("systemctl", &["is-active", "--quiet", self.unit.as_str()]) {
            return Ok(false);
        }
        let Some(started) = self.started_at()? else {
            return Ok(false);
        };
        let changes: Vec<SystemTime> = self.watch.iter().filter_map(|p| modified(p)).collect();
        Ok(started_after_changes(started, &changes))
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        let mut cmd = runner::command("systemctl", ["restart", self.unit.as_str()]);
        runner::run_step_command(&mut cmd, ctx.verbose)
    }
}
