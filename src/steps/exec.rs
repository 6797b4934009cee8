use anyhow::{Context, Result};
use planned::{ApplyContext, Privilege, Step};
use std::path::PathBuf;
use std::process::Command;

use crate::runner;
use crate::user::TargetUser;

/// An arbitrary program run once, guarded by the path it creates
///
/// The argv is executed directly; nothing goes through a shell.
#[derive(Debug, Clone)]
pub struct Exec {
    pub name: String,
    pub argv: Vec<String>,
    pub creates: PathBuf,
    /// Run as this user instead of root
    pub user: Option<TargetUser>,
}

impl Exec {
    fn command(&self) -> Result<Command> {
        let (program, args) = self
            .argv
            .split_first()
            .with_context(|| format!("exec step {} has an empty argv", self.name))?;
        let mut cmd = runner::command(program, args);
        if let Some(user) = &self.user {
            runner::as_user(&mut cmd, user);
        }
        Ok(cmd)
    }
}

impl Step for Exec {
    fn name(&self) -> String {
        format!("exec:{}", self.name)
    }

    fn kind(&self) -> &'static str {
        "exec"
    }

    fn description(&self) -> String {
        format!("Run {}", self.name)
    }

    fn preview(&self) -> String {
        self.command()
            .map_or_else(|e| e.to_string(), |cmd| runner::display(&cmd))
    }

    fn privilege(&self) -> Privilege {
        if self.user.is_some() {
            Privilege::User
        } else {
            Privilege::System
        }
    }

    fn prerequisites(&self) -> Vec<String> {
        self.argv.first().cloned().into_iter().collect()
    }

    fn check(&self) -> Result<bool> {
        Ok(self.creates.exists())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        let mut cmd = self.command()?;
        runner::run_step_command(&mut cmd, ctx.verbose)?;

        if !self.creates.exists() {
            ctx.warn(format!(
                "{} finished but {} does not exist; it will run again next time",
                self.name,
                self.creates.display()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(argv: &[&str], creates: PathBuf) -> Exec {
        Exec {
            name: "test".to_string(),
            argv: argv.iter().map(ToString::to_string).collect(),
            creates,
            user: None,
        }
    }

    #[test]
    fn test_preview_and_prerequisites() {
        let step = exec(
            &["python3", "-m", "venv", "/opt/impacket/venv"],
            PathBuf::from("/opt/impacket/venv/bin/python"),
        );
        assert_eq!(step.preview(), "python3 -m venv /opt/impacket/venv");
        assert_eq!(step.prerequisites(), vec!["python3".to_string()]);
        assert_eq!(step.privilege(), Privilege::System);
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_argv_without_shell() {
        let tmp = tempfile::TempDir::new().unwrap();
        let marker = tmp.path().join("created; echo injected");
        let marker_str = marker.to_string_lossy().to_string();
        let step = exec(&["touch", marker_str.as_str()], marker.clone());

        assert!(!step.check().unwrap());
        let mut ctx = ApplyContext::new(false);
        step.apply(&mut ctx).unwrap();
        assert!(marker.exists());
        assert!(ctx.warnings().is_empty());
        assert!(step.check().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_creates_warns() {
        let tmp = tempfile::TempDir::new().unwrap();
        let step = exec(&["true"], tmp.path().join("never"));

        let mut ctx = ApplyContext::new(false);
        step.apply(&mut ctx).unwrap();
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn test_empty_argv_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let step = exec(&[], tmp.path().join("x"));
        assert!(step.apply(&mut ApplyContext::new(false)).is_err());
        assert!(step.prerequisites().is_empty());
    }
}
