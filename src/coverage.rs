//! Test runner invocation and coverage report parsing.
//!
//! The runner is expected to write a Jest-style JSON report:
//! `{ numTotalTests, numFailedTests, coverageMap: { file: { s: { id: hits } } } }`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::TestsConfig;
use crate::error::Error;

/// Placeholder in the configured command for the report path.
pub const REPORT_PLACEHOLDER: &str = "{report}";

/// Outcome of a test run. All zeros when tests were skipped or unreadable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestSummary {
    pub test_count: u64,
    pub failed_tests: u64,
    pub coverage: f64,
}

/// Machine-readable test report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(default)]
    pub num_total_tests: u64,
    #[serde(default)]
    pub num_failed_tests: u64,
    #[serde(default)]
    pub coverage_map: HashMap<String, FileCoverage>,
}

/// Per-file statement hit counters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCoverage {
    #[serde(default)]
    pub s: HashMap<String, u64>,
}

impl TestReport {
    pub fn parse(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content).map_err(|e| Error::TestReport(e.to_string()))
    }

    /// Percentage of statement counters hit at least once, to 2 decimals.
    pub fn statement_coverage(&self) -> f64 {
        let (covered, total) = self
            .coverage_map
            .values()
            .flat_map(|file| file.s.values())
            .fold((0u64, 0u64), |(covered, total), &hits| {
                (covered + u64::from(hits > 0), total + 1)
            });

        if total == 0 {
            return 0.0;
        }
        let percent = covered as f64 / total as f64 * 100.0;
        (percent * 100.0).round() / 100.0
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            test_count: self.num_total_tests,
            failed_tests: self.num_failed_tests,
            coverage: self.statement_coverage(),
        }
    }
}

/// Run the configured test command and summarize its report.
///
/// Never fails: a missing manifest skips the run, and any problem with
/// the runner or its report degrades to an empty summary.
pub fn run_tests(repo_root: &Path, config: &TestsConfig) -> TestSummary {
    if !config.enabled {
        info!("Tests disabled, skipping");
        return TestSummary::default();
    }
    if !repo_root.join(&config.manifest).exists() {
        info!(manifest = %config.manifest, "No test manifest, skipping tests");
        return TestSummary::default();
    }

    match run_and_read_report(repo_root, config) {
        Ok(report) => {
            let summary = report.summary();
            info!(
                tests = summary.test_count,
                failed = summary.failed_tests,
                coverage = summary.coverage,
                "Collected test results"
            );
            summary
        }
        Err(e) => {
            warn!(error = %e, "No usable test report, recording zero coverage");
            TestSummary::default()
        }
    }
}

fn run_and_read_report(repo_root: &Path, config: &TestsConfig) -> Result<TestReport, Error> {
    let (program, args) = config
        .command
        .split_first()
        .ok_or_else(|| Error::TestReport("empty test command".to_string()))?;

    let report_file = tempfile::Builder::new()
        .prefix("commit-history-report-")
        .suffix(".json")
        .tempfile()?;
    let report_path = report_file.path().to_string_lossy().into_owned();

    let args: Vec<String> = args
        .iter()
        .map(|arg| arg.replace(REPORT_PLACEHOLDER, &report_path))
        .collect();

    info!(program = %program, "Running tests");
    let status = Command::new(program)
        .args(&args)
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    // Failing tests exit non-zero but still write a report.
    if !status.success() {
        warn!(status = %status, "Test runner exited with failure");
    }

    let content = fs::read_to_string(report_file.path())?;
    if content.trim().is_empty() {
        return Err(Error::TestReport("report file is empty".to_string()));
    }
    TestReport::parse(&content)
}
