use clap::Parser;
use clap_complete::Shell;
use planned::ExecutionMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postinst")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Bring a fresh Linux install to a known state", long_about = None)]
#[command(after_help = "\
Exactly one of --run or --dry-run selects what happens; with both, --run wins.
Steps that fail are reported and the run continues with the next step.")]
pub struct Cli {
    /// Apply every step that is not already satisfied
    #[arg(long)]
    pub run: bool,

    /// Show what would change without touching the system
    #[arg(long)]
    pub dry_run: bool,

    /// Config file (default: $POSTINST_CONFIG, /etc/postinst/config.toml,
    /// ~/.config/postinst/config.toml, then the built-in plan)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only run steps matching a kind or kind.name (e.g. apt, file.tmux)
    #[arg(long, value_name = "TARGET")]
    pub only: Option<String>,

    /// List the planned steps in order and exit
    #[arg(long)]
    pub list: bool,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Exit with status 2 if any step failed
    #[arg(long)]
    pub strict: bool,

    /// Verbosity level (-v shows command output, -vv debug logs)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

impl Cli {
    /// Execution mode selected by the flags, if any
    pub fn mode(&self) -> Option<ExecutionMode> {
        ExecutionMode::from_flags(self.run, self.dry_run)
    }
}

/// Whether the raw arguments ask for help anywhere before a `--`
///
/// Help wins over everything else, including flags clap would reject.
pub fn wants_help<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .skip(1)
        .map_while(|a| {
            let a = a.as_ref();
            (a != "--").then(|| is_help_flag(a))
        })
        .any(|h| h)
}

/// `--help`, `-h`, or a short cluster such as `-vh`
///
/// Letters after `c` in a cluster are its config path, not flags.
fn is_help_flag(arg: &str) -> bool {
    if arg == "--help" {
        return true;
    }
    match arg.strip_prefix('-') {
        Some(cluster) if !cluster.starts_with('-') => {
            cluster.chars().take_while(|&c| c != 'c').any(|c| c == 'h')
        }
        _ => false,
    }
}
