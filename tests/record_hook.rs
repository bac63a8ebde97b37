//! End-to-end recording against real git repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use commit_history::config::Config;
use commit_history::coverage::TestSummary;
use commit_history::git::GitCli;
use commit_history::history::HistoryFile;
use commit_history::record::Conclusion;
use commit_history::recorder::Recorder;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("HOME", root)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    git(root, &["init", "-q"]);
    git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(root, &["config", "user.name", "Dana Reyes"]);
    git(root, &["config", "user.email", "dana@example.com"]);
    git(root, &["config", "commit.gpgsign", "false"]);
    dir
}

fn ten_lines() -> String {
    (1..=10).map(|i| format!("line {}\n", i)).collect()
}

fn no_tests() -> TestSummary {
    TestSummary::default()
}

#[test]
fn test_root_commit_counts_all_lines_as_additions() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let root = dir.path();
    fs::write(root.join("notes.txt"), ten_lines()).unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "Initial commit"]);
    git(root, &["remote", "add", "origin", "git@github.com:acme/app.git"]);

    let config = Config::default();
    let vcs = GitCli::new(root);
    let outcome = Recorder::new(&vcs, &config, root).record(no_tests).unwrap();
    let record = &outcome.record;

    assert_eq!(record.sha, git(root, &["rev-parse", "HEAD"]));
    assert_eq!(record.branch, "main");
    assert_eq!(record.author, "Dana Reyes");
    assert_eq!(record.commit.message, "Initial commit");
    assert_eq!(
        record.commit.url,
        format!("https://github.com/acme/app/commit/{}", record.sha)
    );
    assert_eq!(record.stats.additions, 10);
    assert_eq!(record.stats.deletions, 0);
    assert_eq!(record.stats.total, 10);
    assert_eq!(record.conclusion, Conclusion::Neutral);
    assert_eq!(record.test_count, 0);
    assert_eq!(record.coverage, 0.0);

    assert!(root.join("script/commit-history.json").exists());
    assert!(root.join("script/commit-history-main.json").exists());
}

#[test]
fn test_history_files_excluded_from_diff() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let root = dir.path();
    fs::write(root.join("notes.txt"), ten_lines()).unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "Initial commit"]);

    let config = Config::default();
    let vcs = GitCli::new(root);
    Recorder::new(&vcs, &config, root).record(no_tests).unwrap();

    // Commit the history files together with a real change
    git(root, &["checkout", "-q", "-b", "feature/x-1"]);
    fs::write(root.join("notes.txt"), "line 1\nchanged\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "Trim notes"]);

    let outcome = Recorder::new(&vcs, &config, root).record(no_tests).unwrap();
    let record = &outcome.record;

    assert_eq!(record.branch, "feature/x-1");
    assert_eq!(record.stats.additions, 1);
    assert_eq!(record.stats.deletions, 9);
    assert!(record.commit.url.is_empty());
    assert_eq!(
        outcome.branch_file,
        root.join("script/commit-history-feature_x-1.json")
    );

    let global = HistoryFile::load(outcome.global_file.clone());
    assert_eq!(global.len(), 2);
    assert!(global
        .records()
        .windows(2)
        .all(|w| w[0].parsed_date() <= w[1].parsed_date()));
    assert_eq!(HistoryFile::load(outcome.branch_file.clone()).len(), 1);
}

#[test]
fn test_binary_exit_codes() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let root = dir.path();
    fs::write(root.join("notes.txt"), ten_lines()).unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "Initial commit"]);

    let bin = env!("CARGO_BIN_EXE_commit-history");

    let output = Command::new(bin)
        .args(["record", "--no-tests"])
        .current_dir(root)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Recorded"));

    // Detached HEAD has no branch to record against
    git(root, &["checkout", "-q", "--detach"]);
    let output = Command::new(bin)
        .args(["record", "--no-tests"])
        .current_dir(root)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("commit-history:"));

    let history = HistoryFile::load(root.join("script/commit-history.json"));
    assert_eq!(history.len(), 1);
}

#[test]
fn test_record_from_subdirectory_uses_repository_root() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let root = dir.path();
    let sub = root.join("sub");
    fs::create_dir_all(&sub).unwrap();
    fs::write(root.join("top.txt"), "a\nb\nc\nd\ne\n").unwrap();
    fs::write(sub.join("x.txt"), "x\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "Initial commit"]);

    let bin = env!("CARGO_BIN_EXE_commit-history");
    let record_from_sub = || {
        let output = Command::new(bin)
            .args(["record", "--no-tests"])
            .current_dir(&sub)
            .env("HOME", root)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "record failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    };

    assert!(record_from_sub().contains("(+6 -0"));

    // Only a file outside the subdirectory changes
    fs::write(root.join("top.txt"), "a\nb\nc\nd\ne\nf\ng\n").unwrap();
    git(root, &["commit", "-q", "-am", "Extend top"]);
    assert!(record_from_sub().contains("(+2 -0"));

    assert!(!sub.join("script").exists());
    let history = HistoryFile::load(root.join("script/commit-history.json"));
    let totals: Vec<u64> = history.records().iter().map(|r| r.stats.total).collect();
    assert_eq!(totals, vec![6, 2]);
    assert_eq!(HistoryFile::load(root.join("script/commit-history-main.json")).len(), 2);
}
