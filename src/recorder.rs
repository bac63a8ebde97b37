//! Commit recorder.
//!
//! Builds a validated [`CommitRecord`] for HEAD and appends it to the
//! per-branch and global history files.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::coverage::TestSummary;
use crate::error::Error;
use crate::git::{self, DiffStats, Vcs, EMPTY_TREE};
use crate::history;
use crate::record::{validate_sha, CommitRecord, RecordParts};

/// Files written by a successful run.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub record: CommitRecord,
    pub branch_file: PathBuf,
    pub global_file: PathBuf,
}

pub struct Recorder<'a, V: Vcs> {
    vcs: &'a V,
    config: &'a Config,
    repo_root: &'a Path,
}

impl<'a, V: Vcs> Recorder<'a, V> {
    pub fn new(vcs: &'a V, config: &'a Config, repo_root: &'a Path) -> Self {
        Self {
            vcs,
            config,
            repo_root,
        }
    }

    /// Build and validate the record for the current HEAD commit.
    ///
    /// `tests` is only invoked once the commit metadata has been resolved.
    pub fn build_record<F>(&self, tests: F) -> Result<CommitRecord, Error>
    where
        F: FnOnce() -> TestSummary,
    {
        let sha = self.vcs.head_sha()?;
        validate_sha(&sha)?;

        let branch = self
            .vcs
            .current_branch()?
            .filter(|b| !b.trim().is_empty() && b != "HEAD")
            .ok_or(Error::MissingBranch)?;

        let info = self.vcs.commit_info(&sha)?;
        if info.sha != sha {
            return Err(Error::metadata(format!(
                "git reported {} while resolving {}",
                info.sha, sha
            )));
        }
        debug!(sha = %sha, branch = %branch, parents = info.parents.len(), "Resolved commit");

        let stats = self.diff_stats(&sha, info.parents.first().map(String::as_str));
        let url = self.commit_url(&sha);
        let summary = tests();

        let record = CommitRecord::from_parts(RecordParts {
            sha,
            author: info.author,
            branch,
            date: info.date,
            message: info.message,
            url,
            additions: stats.additions,
            deletions: stats.deletions,
            coverage: summary.coverage,
            test_count: summary.test_count,
            failed_tests: summary.failed_tests,
        });

        record.validate()?;
        Ok(record)
    }

    /// Append a validated record to the branch and global history files.
    pub fn persist(&self, record: &CommitRecord) -> Result<RecordOutcome, Error> {
        record.validate()?;

        let dir = self.config.history_dir(self.repo_root);
        let prefix = &self.config.history.file_prefix;
        let branch_file = history::branch_path(&dir, prefix, &record.branch);
        let global_file = history::global_path(&dir, prefix);

        let count = history::append_record(branch_file.clone(), record)?;
        info!(path = %branch_file.display(), records = count, "Updated branch history");

        // The branch file is already on disk at this point
        let count = match history::append_record(global_file.clone(), record) {
            Ok(count) => count,
            Err(e) => {
                error!(
                    written = %branch_file.display(),
                    failed = %global_file.display(),
                    error = %e,
                    "Global history not updated after writing branch history"
                );
                return Err(Error::PartialWrite {
                    written: branch_file,
                    failed: global_file,
                    source: Box::new(e),
                });
            }
        };
        info!(path = %global_file.display(), records = count, "Updated global history");

        Ok(RecordOutcome {
            record: record.clone(),
            branch_file,
            global_file,
        })
    }

    /// Build, validate and persist in one step.
    pub fn record<F>(&self, tests: F) -> Result<RecordOutcome, Error>
    where
        F: FnOnce() -> TestSummary,
    {
        let record = self.build_record(tests)?;
        self.persist(&record)
    }

    /// Diff against the first parent, or the empty tree for a root commit.
    ///
    /// Errors degrade to zero counts.
    fn diff_stats(&self, sha: &str, first_parent: Option<&str>) -> DiffStats {
        let exclude = vec![history::diff_exclude_pathspec(
            &self.config.history.file_prefix,
        )];
        let base = first_parent.unwrap_or(EMPTY_TREE);

        match self.vcs.diff_stats(base, sha, &exclude) {
            Ok(stats) if first_parent.is_none() => DiffStats {
                additions: stats.additions,
                deletions: 0,
            },
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to compute diff stats, recording zero");
                DiffStats::default()
            }
        }
    }

    fn commit_url(&self, sha: &str) -> String {
        let remote = &self.config.git.remote;
        match self.vcs.remote_url(remote) {
            Ok(Some(remote_url)) => git::commit_url(&remote_url, sha).unwrap_or_else(|| {
                debug!(remote = %remote_url, "Remote is not a web URL, leaving commit url empty");
                String::new()
            }),
            Ok(None) => String::new(),
            Err(e) => {
                warn!(remote = %remote, error = %e, "Failed to read remote URL");
                String::new()
            }
        }
    }
}
