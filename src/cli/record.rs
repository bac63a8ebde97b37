//! Record the current commit (called by the post-commit hook).

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::coverage::{self, TestSummary};
use crate::error::Error;
use crate::git::GitCli;
use crate::recorder::Recorder;

/// Run the record command.
pub fn run(repo_root: &Path, skip_tests: bool) -> Result<(), Error> {
    let config = Config::load(repo_root)?;
    let git = GitCli::new(repo_root);
    let recorder = Recorder::new(&git, &config, repo_root);

    let outcome = recorder.record(|| {
        if skip_tests {
            info!("Skipping tests (--no-tests)");
            TestSummary::default()
        } else {
            coverage::run_tests(repo_root, &config.tests)
        }
    })?;

    let record = &outcome.record;
    let short_sha = &record.sha[..record.sha.len().min(7)];
    println!(
        "Recorded {} on {} (+{} -{}, {} tests, {}% coverage, {})",
        short_sha,
        record.branch,
        record.stats.additions,
        record.stats.deletions,
        record.test_count,
        record.coverage,
        record.conclusion
    );

    Ok(())
}
