//! CLI argument definitions using clap.
//!
//! Mirrors the runner's single job: `ralphr <iterations>` with a handful of
//! flags. Stop-on-complete is on by default; `--no-stop-on-complete`
//! disables it.

use clap::Parser;
use std::path::PathBuf;

/// ralphr - Run an agentic coding CLI in a loop with enhanced output
#[derive(Parser, Debug)]
#[command(name = "ralphr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of iterations to run
    pub iterations: u32,

    /// Path to the prompt file
    #[arg(short = 'p', long, default_value = "PROMPT.md")]
    pub prompt_file: PathBuf,

    /// Show verbose/debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Stop when a completion marker is detected (default: on)
    #[arg(short = 's', long)]
    pub stop_on_complete: bool,

    /// Keep iterating even after a completion marker
    #[arg(long, conflicts_with = "stop_on_complete")]
    pub no_stop_on_complete: bool,

    /// Where to write the activity log (default: activity.md)
    #[arg(long)]
    pub activity_file: Option<PathBuf>,

    /// Skip the desktop notification at end of run
    #[arg(long)]
    pub no_notify: bool,

    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Stop-on-complete is the default; only the negative flag turns it off.
    pub fn effective_stop_on_complete(&self) -> bool {
        !self.no_stop_on_complete
    }
}
