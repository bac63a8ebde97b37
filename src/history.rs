//! History files: JSON arrays of commit records sorted by commit date.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::record::{parse_date, sanitize_branch, CommitRecord};
use crate::Error;

/// Path of the global history file.
pub fn global_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}.json", prefix))
}

/// Path of the history file for a branch.
pub fn branch_path(dir: &Path, prefix: &str, branch: &str) -> PathBuf {
    dir.join(format!("{}-{}.json", prefix, sanitize_branch(branch)))
}

/// Pathspec excluding every history file from a diff.
pub fn diff_exclude_pathspec(prefix: &str) -> String {
    format!(":(top,exclude,glob)**/{}*.json", prefix)
}

/// An on-disk history file loaded into memory.
///
/// Entries that do not match the record format are kept as raw JSON so a
/// rewrite never drops them.
#[derive(Debug)]
pub struct HistoryFile {
    path: PathBuf,
    records: Vec<CommitRecord>,
    unparsed: Vec<Value>,
}

impl HistoryFile {
    /// Load a history file.
    ///
    /// A missing or unreadable file, or one that is not a JSON array,
    /// loads as empty history.
    pub fn load(path: PathBuf) -> Self {
        let entries = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(data) => serde_json::from_str::<Vec<Value>>(&data).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "Failed to parse history file, starting fresh");
                    Vec::new()
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read history file, starting fresh");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut records = Vec::with_capacity(entries.len());
        let mut unparsed = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            match CommitRecord::deserialize(&entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), index, error = %e, "Keeping history entry that is not a valid record");
                    unparsed.push(entry);
                }
            }
        }

        Self {
            path,
            records,
            unparsed,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries that parsed as records, in date order.
    pub fn records(&self) -> &[CommitRecord] {
        &self.records
    }

    /// Raw entries that did not parse as records.
    pub fn unparsed(&self) -> &[Value] {
        &self.unparsed
    }

    /// Number of entries in the file, parsed or not.
    pub fn len(&self) -> usize {
        self.records.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record and restore date order.
    pub fn append(&mut self, record: CommitRecord) {
        self.records.push(record);
        self.sort();
    }

    /// Stable sort ascending by commit date. Unparseable dates sort first.
    pub fn sort(&mut self) {
        self.records.sort_by_key(|r| r.parsed_date());
    }

    /// Every entry as JSON, sorted by commit date.
    fn entries(&self) -> Result<Vec<Value>, Error> {
        let mut entries = self
            .records
            .iter()
            .map(|r| Ok((r.parsed_date(), serde_json::to_value(r)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        entries.extend(self.unparsed.iter().map(|v| (entry_date(v), v.clone())));
        entries.sort_by_key(|(date, _)| *date);

        Ok(entries.into_iter().map(|(_, v)| v).collect())
    }

    /// Rewrite the whole file.
    ///
    /// Writes to a temporary file next to the target and renames it into
    /// place.
    pub fn save(&self) -> Result<(), Error> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let data = serde_json::to_string_pretty(&self.entries()?)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(data.as_bytes())?;
        tmp.write_all(b"\n")?;
        // Temp files are created 0600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))?;
        }
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %self.path.display(), entries = self.len(), "Saved history file");
        Ok(())
    }
}

/// Commit date of a raw entry, if it has a parseable one.
fn entry_date(entry: &Value) -> Option<DateTime<FixedOffset>> {
    entry
        .pointer("/commit/date")
        .and_then(Value::as_str)
        .and_then(parse_date)
}

/// Load, append, sort and rewrite a history file.
pub fn append_record(path: PathBuf, record: &CommitRecord) -> Result<usize, Error> {
    let mut history = HistoryFile::load(path);
    history.append(record.clone());
    history.save()?;
    Ok(history.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordParts;
    use tempfile::TempDir;

    fn make_record(sha: &str, date: &str) -> CommitRecord {
        CommitRecord::from_parts(RecordParts {
            sha: sha.to_string(),
            author: "Dana Reyes".to_string(),
            branch: "main".to_string(),
            date: date.to_string(),
            message: format!("commit {}", sha),
            ..Default::default()
        })
    }

    fn is_sorted(records: &[CommitRecord]) -> bool {
        records
            .windows(2)
            .all(|w| w[0].parsed_date() <= w[1].parsed_date())
    }

    #[test]
    fn test_file_names() {
        let dir = Path::new("script");
        assert_eq!(
            global_path(dir, "commit-history"),
            PathBuf::from("script/commit-history.json")
        );
        assert_eq!(
            branch_path(dir, "commit-history", "feature/x-1"),
            PathBuf::from("script/commit-history-feature_x-1.json")
        );
        assert_eq!(
            diff_exclude_pathspec("commit-history"),
            ":(top,exclude,glob)**/commit-history*.json"
        );
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = HistoryFile::load(dir.path().join("missing.json"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "[{\"sha\": ").unwrap();

        let history = HistoryFile::load(path);
        assert!(history.is_empty());
    }

    #[test]
    fn test_append_keeps_date_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script").join("history.json");

        append_record(path.clone(), &make_record("bbbbbbb", "2024-02-01T12:00:00Z")).unwrap();
        append_record(path.clone(), &make_record("aaaaaaa", "2024-01-01T12:00:00Z")).unwrap();
        // Same instant as the first one, expressed in another offset
        append_record(path.clone(), &make_record("ccccccc", "2024-02-01T14:00:00+02:00")).unwrap();
        append_record(path.clone(), &make_record("ddddddd", "2024-01-15T08:00:00-05:00")).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.is_array());

        let history = HistoryFile::load(path);
        let shas: Vec<&str> = history.records().iter().map(|r| r.sha.as_str()).collect();
        assert_eq!(shas, vec!["aaaaaaa", "ddddddd", "bbbbbbb", "ccccccc"]);
        assert!(is_sorted(history.records()));
    }

    #[test]
    fn test_append_n_reload_n() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let record = make_record("abcdef1", "2024-03-01T00:00:00Z");

        for i in 0..5 {
            let len = append_record(path.clone(), &record).unwrap();
            assert_eq!(len, i + 1);
        }

        // Appending the same commit twice is not de-duplicated
        let history = HistoryFile::load(path);
        assert_eq!(history.len(), 5);
        assert!(history.records().iter().all(|r| r == &record));
    }

    #[test]
    fn test_mismatched_entries_survive_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        let mut older = serde_json::to_value(make_record("aaaaaaa", "2024-01-01T00:00:00Z")).unwrap();
        older["coverage"] = Value::Null;
        let valid = serde_json::to_value(make_record("bbbbbbb", "2024-02-01T00:00:00Z")).unwrap();
        let newer_partial = serde_json::json!({
            "sha": "ccccccc",
            "commit": { "date": "2024-04-01T00:00:00Z" }
        });
        let entries = Value::Array(vec![valid, newer_partial, older]);
        fs::write(&path, serde_json::to_string_pretty(&entries).unwrap()).unwrap();

        let history = HistoryFile::load(path.clone());
        assert_eq!(history.records().len(), 1);
        assert_eq!(history.unparsed().len(), 2);

        let len = append_record(path.clone(), &make_record("ddddddd", "2024-03-01T00:00:00Z")).unwrap();
        assert_eq!(len, 4);

        let raw: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let shas: Vec<&str> = raw.iter().map(|v| v["sha"].as_str().unwrap()).collect();
        assert_eq!(shas, vec!["aaaaaaa", "bbbbbbb", "ddddddd", "ccccccc"]);
        assert!(raw[0]["coverage"].is_null());
    }

    #[test]
    fn test_corrupt_file_is_replaced_on_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not an array }").unwrap();

        let len = append_record(path.clone(), &make_record("abcdef1", "2024-03-01T00:00:00Z")).unwrap();
        assert_eq!(len, 1);
        assert_eq!(HistoryFile::load(path).len(), 1);
    }
}
