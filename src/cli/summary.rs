//! Report over a history file.

use std::path::Path;

use crate::config::Config;
use crate::error::Error;
use crate::history::{self, HistoryFile};
use crate::record::{CommitRecord, Conclusion};

/// Aggregates over a set of records.
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub records: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub success: usize,
    pub failure: usize,
    pub neutral: usize,
    /// Mean coverage over records that ran tests.
    pub mean_coverage: Option<f64>,
    pub additions: u64,
    pub deletions: u64,
}

impl Summary {
    pub fn from_records(records: &[CommitRecord]) -> Self {
        let mut summary = Summary {
            records: records.len(),
            first_date: records.first().map(|r| r.stats.date.clone()),
            last_date: records.last().map(|r| r.stats.date.clone()),
            ..Default::default()
        };

        let mut coverage_sum = 0.0;
        let mut tested = 0usize;
        for record in records {
            match record.conclusion {
                Conclusion::Success => summary.success += 1,
                Conclusion::Failure => summary.failure += 1,
                Conclusion::Neutral => summary.neutral += 1,
            }
            if record.test_count > 0 {
                coverage_sum += record.coverage;
                tested += 1;
            }
            summary.additions += record.stats.additions;
            summary.deletions += record.stats.deletions;
        }

        if tested > 0 {
            summary.mean_coverage = Some((coverage_sum / tested as f64 * 100.0).round() / 100.0);
        }
        summary
    }
}

/// Run the summary command.
pub fn run(repo_root: &Path, branch: Option<&str>, last: usize) -> Result<(), Error> {
    let config = Config::load(repo_root)?;
    let dir = config.history_dir(repo_root);
    let prefix = &config.history.file_prefix;

    let path = match branch {
        Some(branch) => history::branch_path(&dir, prefix, branch),
        None => history::global_path(&dir, prefix),
    };

    if !path.exists() {
        println!("No history at {}", path.display());
        return Ok(());
    }

    let history = HistoryFile::load(path);
    let summary = Summary::from_records(history.records());

    println!("History: {}", history.path().display());
    println!("  Commits:    {}", summary.records);
    if let (Some(first), Some(last)) = (&summary.first_date, &summary.last_date) {
        println!("  Span:       {} .. {}", first, last);
    }
    println!(
        "  Tests:      {} success, {} failure, {} neutral",
        summary.success, summary.failure, summary.neutral
    );
    match summary.mean_coverage {
        Some(coverage) => println!("  Coverage:   {}% mean", coverage),
        None => println!("  Coverage:   n/a"),
    }
    println!("  Lines:      +{} -{}", summary.additions, summary.deletions);

    let records = history.records();
    if last > 0 && !records.is_empty() {
        println!();
        for record in &records[records.len().saturating_sub(last)..] {
            let subject = record.commit.message.lines().next().unwrap_or("");
            println!(
                "  {}  {}  {:<8} +{:<5} -{:<5} {}",
                record.sha.chars().take(7).collect::<String>(),
                record.stats.date,
                record.conclusion.to_string(),
                record.stats.additions,
                record.stats.deletions,
                subject
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordParts;

    fn make_record(date: &str, tests: u64, failed: u64, coverage: f64) -> CommitRecord {
        CommitRecord::from_parts(RecordParts {
            sha: "abcdef1".to_string(),
            author: "Dana Reyes".to_string(),
            branch: "main".to_string(),
            date: date.to_string(),
            message: "work".to_string(),
            additions: 5,
            deletions: 1,
            coverage,
            test_count: tests,
            failed_tests: failed,
            ..Default::default()
        })
    }

    #[test]
    fn test_summary_of_empty_history() {
        let summary = Summary::from_records(&[]);
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            make_record("2024-01-01T00:00:00Z", 0, 0, 0.0),
            make_record("2024-01-02T00:00:00Z", 10, 2, 70.0),
            make_record("2024-01-03T00:00:00Z", 10, 0, 80.5),
        ];

        let summary = Summary::from_records(&records);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.first_date.as_deref(), Some("2024-01-01"));
        assert_eq!(summary.last_date.as_deref(), Some("2024-01-03"));
        assert_eq!((summary.success, summary.failure, summary.neutral), (1, 1, 1));
        assert_eq!(summary.mean_coverage, Some(75.25));
        assert_eq!(summary.additions, 15);
        assert_eq!(summary.deletions, 3);
    }
}
