//! Console progress for a postinst run
//!
//! Each finished step prints one line as soon as it completes, so an
//! interrupted run still shows everything that happened. While an action is
//! running on an interactive terminal a spinner names the step.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use planned::{ExecutionLog, ExecutionMode, LogEntry, Outcome, ProgressCallback, Step, Summary};
use std::time::Duration;

use crate::ui;

pub struct ConsoleProgress {
    total: usize,
    mode: ExecutionMode,
    quiet: bool,
    spinners: bool,
    spinner: Option<ProgressBar>,
}

impl ConsoleProgress {
    /// `verbose` runs stream command output, which a spinner would garble
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            total: 0,
            mode: ExecutionMode::Simulate,
            quiet,
            spinners: !quiet && !verbose && console::user_attended(),
            spinner: None,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a line without tearing the spinner
    fn print(&self, line: &str) {
        match &self.spinner {
            Some(pb) => pb.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// One status line for a finished step
pub fn outcome_line(entry: &LogEntry) -> String {
    match &entry.outcome {
        Outcome::Skipped => format!(
            "  {} {} {}",
            "·".dimmed(),
            entry.step,
            "(already satisfied)".dimmed()
        ),
        Outcome::Simulated { plan } => {
            let mut lines = plan.lines();
            let first = lines.next().unwrap_or_default();
            let mut out = format!("  {} {} {}", "~".cyan(), entry.step, format!("would {first}").dimmed());
            for line in lines {
                out.push('\n');
                out.push_str(&diff_line(line));
            }
            out
        }
        Outcome::Applied => format!("  {} {}", "✓".green(), entry.step),
        Outcome::Failed { reason } => {
            format!("  {} {} {}", "✗".red(), entry.step, reason.red())
        }
    }
}

fn diff_line(line: &str) -> String {
    let padded = format!("      {line}");
    if line.starts_with("+++") || line.starts_with("---") {
        padded.bold().to_string()
    } else if line.starts_with('+') {
        padded.green().to_string()
    } else if line.starts_with('-') {
        padded.red().to_string()
    } else if line.starts_with("@@") {
        padded.cyan().to_string()
    } else {
        padded.dimmed().to_string()
    }
}

/// Print the closing summary for a run
pub fn print_summary(mode: ExecutionMode, summary: &Summary) {
    let mut parts = Vec::new();
    match mode {
        ExecutionMode::Apply => parts.push(format!("{} applied", summary.applied).green().to_string()),
        ExecutionMode::Simulate => {
            parts.push(format!("{} would change", summary.simulated).cyan().to_string());
        }
    }
    parts.push(format!("{} already satisfied", summary.skipped));
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed).red().to_string());
    }
    if summary.warnings > 0 {
        parts.push(format!("{} warnings", summary.warnings).yellow().to_string());
    }

    println!();
    println!("{} {}", "Summary:".bold(), parts.join(", "));
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_start(&mut self, total: usize, mode: ExecutionMode) {
        self.total = total;
        self.mode = mode;
        if self.quiet {
            return;
        }
        let title = match mode {
            ExecutionMode::Apply => format!("Applying {total} steps"),
            ExecutionMode::Simulate => format!("Dry run: {total} steps, nothing will be changed"),
        };
        ui::header(&title);
    }

    fn on_step_start(&mut self, index: usize, step: &dyn Step) {
        log::debug!("[{}/{}] {}", index + 1, self.total, step.name());
        if self.spinners && self.mode == ExecutionMode::Apply {
            self.spinner = Some(spinner(format!(
                "[{}/{}] {}",
                index + 1,
                self.total,
                step.description()
            )));
        }
    }

    fn on_warning(&mut self, step: &str, warning: &str) {
        let line = format!("  {} {step}: {warning}", "⚠".yellow());
        self.print(&line);
    }

    fn on_step_complete(&mut self, entry: &LogEntry) {
        self.clear_spinner();
        if self.quiet && !entry.outcome.is_failure() {
            return;
        }
        println!("{}", outcome_line(entry));
    }

    fn on_run_complete(&mut self, log: &ExecutionLog) {
        self.clear_spinner();
        if !self.quiet {
            print_summary(log.mode, &log.summary());
        }
    }
}
