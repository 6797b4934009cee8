use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::user::{TargetUser, is_root};

/// Build a command for a program and its arguments
pub fn command<I, S>(program: &str, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}

/// Arrange for a command to run as the target user
///
/// Only has an effect when this process is root and the target user isn't.
pub fn as_user(cmd: &mut Command, user: &TargetUser) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        if is_root() && user.uid != 0 {
            cmd.uid(user.uid).gid(user.gid);
        }
    }

    cmd.env("HOME", &user.home)
        .env("USER", &user.name)
        .env("LOGNAME", &user.name);
}

/// Render a command line for previews and error messages
pub fn display(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| quote(&a.to_string_lossy())));
    parts.join(" ")
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Run a step's command
///
/// Verbose runs inherit stdio so output shows in real time. Otherwise the
/// output is captured and the tail of stderr goes into the error.
pub fn run_step_command(cmd: &mut Command, verbose: bool) -> Result<()> {
    let line = display(cmd);
    log::debug!("Running: {line}");

    if verbose {
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute: {line}"))?;
        if !status.success() {
            bail!("`{line}` exited with {status}");
        }
        return Ok(());
    }

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {line}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail_lines(&stderr, 5);
        if tail.is_empty() {
            bail!("`{line}` exited with {}", output.status);
        }
        bail!("`{line}` exited with {}: {tail}", output.status);
    }

    Ok(())
}

/// Last `n` non-empty lines of some output, joined with "; "
fn tail_lines(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines[lines.len().saturating_sub(n)..].join("; ")
}

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
