//! Integration tests for the postinst command line.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory with a config whose steps only touch that directory
struct Sandbox {
    temp: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new(steps: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().display().to_string();
        let config = temp.path().join("config.toml");
        fs::write(&config, steps.replace("@ROOT@", &root)).unwrap();
        Self { temp, config }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn postinst(&self) -> Command {
        let mut cmd = postinst();
        cmd.arg("--config").arg(&self.config);
        cmd
    }
}

fn postinst() -> Command {
    let mut cmd = Command::new(cargo_bin("postinst"));
    cmd.env("NO_COLOR", "1")
        .env_remove("POSTINST_CONFIG")
        .env_remove("SUDO_USER")
        .env_remove("DOAS_USER")
        .env_remove("PKEXEC_UID");
    cmd
}

const USER_STEPS: &str = r#"
[[step]]
kind = "directory"
path = "@ROOT@/home/go/bin"

[[step]]
kind = "file"
path = "@ROOT@/home/.tmux.conf"
contents = "set -g mouse on\n"
mode = "0644"

[[step]]
kind = "env"
name = "GOPATH"
value = "$HOME/go"
rc_files = ["@ROOT@/home/.zshrc"]
"#;

fn snapshot(dir: &Path) -> Vec<PathBuf> {
    let mut seen = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            seen.push(path);
        }
    }
    seen.sort();
    seen
}

#[test]
fn cli_no_args_prints_usage() -> Result<(), Box<dyn std::error::Error>> {
    postinst()
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
    Ok(())
}

#[test]
fn cli_help_wins_over_everything() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    sandbox
        .postinst()
        .args(["--run", "--bogus", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));

    assert!(!sandbox.path("home").exists());
    Ok(())
}

#[test]
fn cli_short_help() -> Result<(), Box<dyn std::error::Error>> {
    postinst()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("--run"));
    Ok(())
}

#[test]
fn cli_help_in_short_cluster() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    sandbox
        .postinst()
        .args(["--run", "--bogus", "-vh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));

    assert!(!sandbox.path("home").exists());
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    postinst()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_unknown_flag_fails() -> Result<(), Box<dyn std::error::Error>> {
    postinst()
        .arg("--bogus")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
    Ok(())
}

#[test]
fn cli_requires_a_mode() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    sandbox
        .postinst()
        .arg("--strict")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--dry-run"));
    Ok(())
}

#[test]
fn cli_dry_run_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    let before = snapshot(sandbox.temp.path());

    sandbox
        .postinst()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("would create"))
        .stdout(predicate::str::contains("3 would change"));

    assert_eq!(snapshot(sandbox.temp.path()), before);
    Ok(())
}

#[test]
fn cli_run_applies_then_skips() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);

    sandbox
        .postinst()
        .arg("--run")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 applied"));

    assert!(sandbox.path("home/go/bin").is_dir());
    assert_eq!(
        fs::read_to_string(sandbox.path("home/.tmux.conf"))?,
        "set -g mouse on\n"
    );
    assert_eq!(
        fs::read_to_string(sandbox.path("home/.zshrc"))?,
        "export GOPATH=\"$HOME/go\"\n"
    );

    sandbox
        .postinst()
        .arg("--run")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 applied, 3 already satisfied"));

    // Appending is idempotent too
    assert_eq!(fs::read_to_string(sandbox.path("home/.zshrc"))?.lines().count(), 1);
    Ok(())
}

#[test]
fn cli_run_wins_over_dry_run() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    sandbox
        .postinst()
        .args(["--dry-run", "--run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applying 3 steps"));

    assert!(sandbox.path("home/.tmux.conf").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_failure_does_not_stop_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(
        r#"
[[step]]
kind = "exec"
name = "broken"
argv = ["false"]
creates = "@ROOT@/never"

[[step]]
kind = "file"
path = "@ROOT@/after.txt"
contents = "still written\n"
"#,
    );

    sandbox
        .postinst()
        .arg("--run")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec:broken"))
        .stdout(predicate::str::contains("1 failed"));
    assert!(sandbox.path("after.txt").exists());

    fs::remove_file(sandbox.path("after.txt"))?;
    sandbox.postinst().args(["--run", "--strict"]).assert().code(2);
    Ok(())
}

#[test]
fn cli_missing_prerequisite_is_a_warning() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(
        r#"
[[step]]
kind = "exec"
name = "ghost"
argv = ["postinst-no-such-tool", "--flag"]
creates = "@ROOT@/ghost"
"#,
    );

    sandbox
        .postinst()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("prerequisite `postinst-no-such-tool` not found"))
        .stdout(predicate::str::contains("1 warnings"));
    Ok(())
}

#[test]
fn cli_list_shows_order() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    let output = sandbox.postinst().arg("--list").output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let dir = stdout.find("directory:").unwrap();
    let file = stdout.find("file:").unwrap();
    let env = stdout.find("env:GOPATH@").unwrap();
    assert!(dir < file && file < env, "{stdout}");
    assert!(!sandbox.path("home").exists());
    Ok(())
}

#[test]
fn cli_only_filters_steps() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    sandbox
        .postinst()
        .args(["--run", "--only", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 applied"));

    assert!(sandbox.path("home/.tmux.conf").exists());
    assert!(!sandbox.path("home/.zshrc").exists());

    sandbox
        .postinst()
        .args(["--run", "--only", "service"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No steps match"));
    Ok(())
}

#[test]
fn cli_invalid_config_fails_before_any_step() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(
        r#"
[[step]]
kind = "file"
path = "@ROOT@/first.txt"
contents = "x"

[[step]]
kind = "directory"
path = "relative/dir"
"#,
    );

    sandbox
        .postinst()
        .arg("--run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not an absolute path"));
    assert!(!sandbox.path("first.txt").exists());
    Ok(())
}

#[test]
fn cli_writes_report() -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = Sandbox::new(USER_STEPS);
    let report = sandbox.path("report.json");

    sandbox
        .postinst()
        .arg("--dry-run")
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report)?)?;
    assert_eq!(value["mode"], "simulate");
    assert_eq!(value["summary"]["simulated"], 3);
    assert_eq!(value["entries"][0]["outcome"]["status"], "simulated");
    Ok(())
}
