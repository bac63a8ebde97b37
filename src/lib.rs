//! commit-history library.
//!
//! Records per-commit metadata into JSON history files from a git
//! post-commit hook.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod git;
pub mod history;
pub mod record;
pub mod recorder;

pub use error::Error;
