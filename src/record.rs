//! Commit record model and validation.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

static SHA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,40}$").expect("valid sha regex"));

static UNSAFE_BRANCH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid branch regex"));

/// Test health verdict for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Neutral,
}

impl Conclusion {
    /// Neutral when no tests ran, failure when any failed.
    pub fn from_counts(test_count: u64, failed_tests: u64) -> Self {
        if test_count == 0 {
            Conclusion::Neutral
        } else if failed_tests > 0 {
            Conclusion::Failure
        } else {
            Conclusion::Success
        }
    }
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conclusion::Success => write!(f, "success"),
            Conclusion::Failure => write!(f, "failure"),
            Conclusion::Neutral => write!(f, "neutral"),
        }
    }
}

/// Commit metadata block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMeta {
    /// ISO 8601 committer date.
    pub date: String,
    pub message: String,
    /// Web URL of the commit, empty when no remote is configured.
    #[serde(default)]
    pub url: String,
}

/// Line counts for a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub additions: u64,
    pub deletions: u64,
    /// YYYY-MM-DD, UTC.
    pub date: String,
}

/// One recorded commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub branch: String,
    pub commit: CommitMeta,
    pub stats: Stats,
    pub coverage: f64,
    pub test_count: u64,
    pub failed_tests: u64,
    pub conclusion: Conclusion,
}

/// Inputs gathered from git and the test runner.
#[derive(Debug, Clone, Default)]
pub struct RecordParts {
    pub sha: String,
    pub author: String,
    pub branch: String,
    pub date: String,
    pub message: String,
    pub url: String,
    pub additions: u64,
    pub deletions: u64,
    pub coverage: f64,
    pub test_count: u64,
    pub failed_tests: u64,
}

impl CommitRecord {
    /// Assemble a record, deriving totals, the stats date and the conclusion.
    pub fn from_parts(parts: RecordParts) -> Self {
        let stats_date = parse_date(&parts.date)
            .map(|d| d.with_timezone(&Utc).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| parts.date.chars().take(10).collect());

        Self {
            conclusion: Conclusion::from_counts(parts.test_count, parts.failed_tests),
            sha: parts.sha,
            author: parts.author,
            branch: parts.branch,
            commit: CommitMeta {
                date: parts.date,
                message: parts.message,
                url: parts.url,
            },
            stats: Stats {
                total: parts.additions + parts.deletions,
                additions: parts.additions,
                deletions: parts.deletions,
                date: stats_date,
            },
            coverage: parts.coverage,
            test_count: parts.test_count,
            failed_tests: parts.failed_tests,
        }
    }

    /// Check the record before it is persisted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sha == "HEAD" {
            return Err(Error::ForbiddenHeadRef(self.sha.clone()));
        }
        validate_sha(&self.sha)?;

        let url = &self.commit.url;
        if url.ends_with("/commit/HEAD") {
            return Err(Error::ForbiddenHeadRef(url.clone()));
        }
        if !url.is_empty() && !url.ends_with(&self.sha) {
            return Err(Error::UrlMismatch {
                url: url.clone(),
                sha: self.sha.clone(),
            });
        }

        if self.branch.trim().is_empty() {
            return Err(Error::MissingBranch);
        }

        Ok(())
    }

    /// Parsed commit date, if well-formed.
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        parse_date(&self.commit.date)
    }
}

/// Check that a hash is 7-40 lowercase hex characters.
pub fn validate_sha(sha: &str) -> Result<(), Error> {
    if sha == "HEAD" {
        return Err(Error::ForbiddenHeadRef(sha.to_string()));
    }
    if !SHA_PATTERN.is_match(sha) {
        return Err(Error::InvalidSha(sha.to_string()));
    }
    Ok(())
}

/// Make a branch name safe for use in a file name.
pub fn sanitize_branch(branch: &str) -> String {
    UNSAFE_BRANCH_CHARS.replace_all(branch, "_").into_owned()
}

/// Parse an RFC 3339 commit date.
pub fn parse_date(date: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(date.trim()).ok()
}
