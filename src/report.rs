use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planned::{ExecutionLog, Summary};
use serde::Serialize;
use std::path::Path;

/// Machine-readable record of a run, written by `--report`
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub user: &'a str,
    pub config: String,
    pub summary: Summary,
    #[serde(flatten)]
    pub log: &'a ExecutionLog,
}

impl<'a> Report<'a> {
    pub fn new(
        log: &'a ExecutionLog,
        user: &'a str,
        config: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            started_at,
            finished_at: Utc::now(),
            user,
            config,
            summary: log.summary(),
            log,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planned::{ExecutionMode, LogEntry, Outcome};

    #[test]
    fn test_report_shape() {
        let mut log = ExecutionLog::new(ExecutionMode::Apply);
        log.push(LogEntry {
            step: "apt:tmux".into(),
            kind: "apt".into(),
            outcome: Outcome::Applied,
            warnings: Vec::new(),
        });
        log.push(LogEntry {
            step: "go:kerbrute".into(),
            kind: "go".into(),
            outcome: Outcome::Failed {
                reason: "go toolchain not found".into(),
            },
            warnings: vec!["prerequisite `go` not found on PATH".into()],
        });

        let report = Report::new(&log, "kali", "built-in default".into(), Utc::now());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["mode"], "apply");
        assert_eq!(value["user"], "kali");
        assert_eq!(value["summary"]["applied"], 1);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["entries"][1]["outcome"]["status"], "failed");
        assert_eq!(value["entries"][1]["warnings"][0], "prerequisite `go` not found on PATH");
        assert!(value["entries"][0].get("warnings").is_none());
    }

    #[test]
    fn test_write_report() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        let log = ExecutionLog::new(ExecutionMode::Simulate);

        Report::new(&log, "kali", "/etc/postinst/config.toml".into(), Utc::now())
            .write(&path)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "simulate");
        assert_eq!(value["entries"].as_array().unwrap().len(), 0);
    }
}
