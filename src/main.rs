mod cli;
mod config;
mod paths;
mod planner;
mod progress;
mod report;
mod runner;
mod steps;
mod ui;
mod user;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use cli::Cli;
use config::Config;
use planned::{ExecuteOptions, ExecutionMode, execute};
use progress::ConsoleProgress;
use std::io;
use std::process::ExitCode;
use user::TargetUser;

/// Invalid invocation or unusable configuration
const EXIT_USAGE: u8 = 1;
/// `--strict` and at least one step failed
const EXIT_FAILED_STEPS: u8 = 2;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    if args.len() <= 1 || cli::wants_help(&args) {
        print_help();
        return ExitCode::SUCCESS;
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    init_logging(&cli);

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "postinst", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    if cli.mode().is_none() && !cli.list {
        eprintln!("{}", Cli::command().render_usage());
        ui::error("Nothing to do: pass --run to apply or --dry-run to preview");
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn print_help() {
    let mut cmd = Cli::command();
    let _ = cmd.print_help();
    println!();
}

fn init_logging(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();
}

/// Load, plan and execute
///
/// Errors are fatal setup problems; step failures only show up in the log.
fn run(cli: &Cli) -> Result<ExitCode> {
    let started_at = chrono::Utc::now();
    let user = TargetUser::resolve()?;
    let source = paths::config_source(cli.config.as_deref(), &user);
    log::info!("Using configuration: {source}");

    let config = Config::load(&source)?;
    let plan = planner::build_plan(&config, &user).filter_by_target(cli.only.as_deref());

    if plan.is_empty() {
        match &cli.only {
            Some(target) => anyhow::bail!("No steps match `{target}`"),
            None => {
                ui::info(&format!("{source} defines no steps"));
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    if cli.list {
        list(&plan, &user, &source);
        return Ok(ExitCode::SUCCESS);
    }

    // `mode()` is Some here: main rejects runs without a mode flag
    let mode = cli.mode().unwrap_or(ExecutionMode::Simulate);

    if !cli.quiet {
        ui::kv("user", &format!("{} ({})", user.name, user.home.display()));
        ui::kv("config", &source.to_string());
    }
    if mode == ExecutionMode::Apply && plan.has_privileged() && !user::is_root() {
        ui::warn("Not running as root: system steps will likely fail (try sudo)");
    }

    let mut progress = ConsoleProgress::new(cli.quiet, cli.verbose > 0);
    let options = ExecuteOptions {
        mode,
        verbose: cli.verbose > 0,
    };
    let log = execute(&plan, options, &mut progress);

    if let Some(path) = &cli.report {
        report::Report::new(&log, &user.name, source.to_string(), started_at).write(path)?;
        log::info!("Report written to {}", path.display());
    }

    let summary = log.summary();
    if cli.strict && !summary.is_success() {
        return Ok(ExitCode::from(EXIT_FAILED_STEPS));
    }
    Ok(ExitCode::SUCCESS)
}

fn list(plan: &planned::Plan, user: &TargetUser, source: &paths::ConfigSource) {
    ui::header(&format!("{} steps from {source}", plan.len()));
    for (i, step) in plan.iter().enumerate() {
        let scope = match step.privilege() {
            planned::Privilege::System => "system",
            planned::Privilege::User => user.name.as_str(),
        };
        println!("{:>4}. {}  {}", i + 1, step.name(), format!("[{scope}]").dimmed());
        ui::dim(&format!("   {}", step.description()));
    }
}
