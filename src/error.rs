//! Error types for the commit recorder.

use std::path::PathBuf;

use thiserror::Error;

/// Recorder error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Invalid commit hash: {0:?}")]
    InvalidSha(String),

    #[error("Refusing to record unresolved HEAD reference: {0}")]
    ForbiddenHeadRef(String),

    #[error("Commit URL {url} does not end with {sha}")]
    UrlMismatch { url: String, sha: String },

    #[error("No branch name (detached HEAD?)")]
    MissingBranch,

    #[error("Missing commit metadata: {0}")]
    MissingMetadata(String),

    #[error(
        "Recorded to {} but failed to update {}: {source}",
        .written.display(),
        .failed.display()
    )]
    PartialWrite {
        written: PathBuf,
        failed: PathBuf,
        source: Box<Error>,
    },

    #[error("Test report error: {0}")]
    TestReport(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Error::MissingMetadata(msg.into())
    }
}
