//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - watch: poll a JSON field and report changes
//! - status: wait for an event's status to change
//! - batch: look up transcoding status for many ids, one at a time

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// eventwatch - watch event endpoints for changes
#[derive(Parser, Debug)]
#[command(name = "eventwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a JSON endpoint and print every change of one field
    Watch {
        /// URL returning a JSON object
        url: String,

        /// Field to watch, as a JSON pointer or dotted name
        #[arg(short, long, default_value = "/status")]
        pointer: String,

        /// Override the configured poll interval
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Override the configured delay before the first check
        #[arg(long)]
        initial_delay_ms: Option<u64>,

        /// Exit after the first change
        #[arg(long)]
        once_changed: bool,

        /// Treat each line on stdin as a push hint to check now
        #[arg(long)]
        hint_stdin: bool,
    },

    /// Wait until an event's status changes (watch /status, exit on change)
    Status {
        /// Event status URL
        url: String,

        /// Override the configured poll interval
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Look up transcoding status for each id, one request at a time
    Batch {
        /// Status endpoint, queried as <url>?id=<id>
        url: String,

        /// Event ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Ask the server to bypass its cache
        #[arg(short, long)]
        refresh: bool,
    },
}
