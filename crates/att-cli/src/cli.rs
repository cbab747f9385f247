//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Attendance overview for monitored positions.
///
/// Reconciles badge arrivals and departures into attendance intervals per
/// position and day, and shows where a record is missing.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
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
    /// Show reconciled attendance per position and day.
    Dashboard {
        /// Most recent day to show (YYYY-MM-DD, 'today', 'yesterday', '3 days ago').
        #[arg(long)]
        date: Option<String>,

        /// Number of days ending with --date.
        #[arg(long, default_value_t = 2)]
        days: u32,

        /// Only show this position (repeatable).
        #[arg(long = "position", value_name = "POSITION")]
        positions: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Read records from a JSONL export instead of the database.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Supervisor password, when one is configured.
        #[arg(long, env = "ATT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Import badge records from JSONL (stdin by default).
    Import {
        /// Read from this file instead of stdin.
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Show stored records per position.
    Status,
}
