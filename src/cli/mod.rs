//! CLI commands for commit-history.

pub mod hooks;
pub mod record;
pub mod summary;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// commit-history - record per-commit metadata into JSON history files
#[derive(Parser)]
#[command(name = "commit-history")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record the current HEAD commit (run by the post-commit hook)
    Record {
        /// Don't run the test suite
        #[arg(long)]
        no_tests: bool,
    },

    /// Install the post-commit hook
    Install,

    /// Remove the post-commit hook
    Uninstall,

    /// Summarize a history file
    Summary {
        /// Branch history to read instead of the global file
        #[arg(long)]
        branch: Option<String>,

        /// Number of most recent commits to list
        #[arg(long, default_value_t = 10)]
        last: usize,
    },
}
