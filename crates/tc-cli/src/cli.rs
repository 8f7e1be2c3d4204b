//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Work session time clock.
///
/// Tracks start/pause/resume/stop of work sessions and reports time per
/// category per local calendar day.
#[derive(Debug, Parser)]
#[command(name = "tc", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new session, or resume a paused one.
    Start {
        /// Category of work (e.g., Task, Project, Training). Falls back to
        /// `default_category` from the config.
        #[arg(short = 'k', long)]
        category: Option<String>,

        /// Free-form description of the work.
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Resume a paused session.
    Resume,

    /// Pause the running session.
    Pause,

    /// Stop the current session.
    Stop,

    /// Show the current session and elapsed time.
    Status,

    /// Report totals per category and days with any work.
    Report {
        /// First local date to include (YYYY-MM-DD).
        #[arg(long)]
        from: String,

        /// Last local date to include (YYYY-MM-DD).
        #[arg(long)]
        to: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent state changes.
    Log {
        /// Number of events to show.
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },

    /// View or change preferences.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Preference subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print all preferences.
    Show,

    /// Show durations to the second instead of rounding to minutes.
    ExactDurations {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}
