use anyhow::{Context, Result};
use planned::{ApplyContext, Privilege, Step};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use super::{Ownership, create_dirs};

/// An `export NAME="value"` line in a shell rc file
#[derive(Debug, Clone)]
pub struct EnvExport {
    pub name: String,
    pub value: String,
    pub rc_file: PathBuf,
    pub rc_label: String,
    pub owner: Ownership,
}

impl EnvExport {
    /// The exact line this step maintains
    pub fn line(&self) -> String {
        format!("export {}=\"{}\"", self.name, escape(&self.value))
    }
}

/// Escape a value for a double-quoted shell string, keeping `$` live
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn contains_line(contents: &str, line: &str) -> bool {
    contents.lines().any(|l| l.trim() == line)
}

impl Step for EnvExport {
    fn name(&self) -> String {
        format!("env:{}@{}", self.name, self.rc_label)
    }

    fn kind(&self) -> &'static str {
        "env"
    }

    fn description(&self) -> String {
        format!("Export {} in {}", self.name, self.rc_label)
    }

    fn preview(&self) -> String {
        format!("append to {}: {}", self.rc_label, self.line())
    }

    fn privilege(&self) -> Privilege {
        self.owner.privilege()
    }

    fn check(&self) -> Result<bool> {
        match fs::read_to_string(&self.rc_file) {
            Ok(contents) => Ok(contains_line(&contents, &self.line())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.rc_file.display())),
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        if let Some(parent) = self.rc_file.parent() {
            create_dirs(parent, &self.owner)?;
        }

        let existed = self.rc_file.exists();
        let needs_newline = fs::read(&self.rc_file)
            .map(|bytes| bytes.last().is_some_and(|b| *b != b'\n'))
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.rc_file)
            .with_context(|| format!("Failed to open {}", self.rc_file.display()))?;

        let mut text = String::new();
        if needs_newline {
            text.push('\n');
        }
        text.push_str(&self.line());
        text.push('\n');
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write {}", self.rc_file.display()))?;

        if !existed {
            self.owner.apply(&self.rc_file)?;
        }
        Ok(())
    }
}
