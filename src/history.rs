use crate::error::AnalyzerError;
use crate::outcome::{HistoryEntry, TestStats};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// Persisted document shape: { "tests": { "<key>": [entries...] } }.
#[derive(Debug, Serialize, Deserialize, Default)]
struct HistoryFile {
    #[serde(default)]
    tests: BTreeMap<String, Vec<HistoryEntry>>,
}

/// Append-only per-key log of past outcomes, backed by one JSON file.
///
/// The file is read in full at run start and rewritten in full by
/// `persist()`, so load must happen before any append and exactly one
/// persist per run after all appends. Two runs writing the same file
/// race on persist and the later writer silently wins; this store has
/// no locking and does not support concurrent runs.
pub struct HistoryStore {
    path: PathBuf,
    tests: BTreeMap<String, Vec<HistoryEntry>>,
    trend_window: usize,
}

impl HistoryStore {
    /// Loads the backing file. A missing file is an empty history; an
    /// unreadable or corrupt one degrades to empty with a warning, so a
    /// damaged file can never take the whole run down.
    pub fn load(path: &Path, trend_window: usize) -> Self {
        let tests = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
                Ok(file) => file.tests,
                Err(e) => {
                    let err = AnalyzerError::MalformedHistory {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    };
                    eprintln!("{}", format!("{} - starting with empty history", err).yellow());
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            tests,
            trend_window,
        }
    }

    /// Stats for a key considering only entries at or before `as_of`
    /// (the run start), so results appended earlier in the same run
    /// never leak into another decision.
    pub fn stats_for(&self, key: &str, as_of: DateTime<Utc>) -> TestStats {
        let prior: Vec<HistoryEntry> = self
            .tests
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.timestamp <= as_of)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        TestStats::from_entries(&prior, self.trend_window)
    }

    /// Full ordered history for a key, including same-run appends.
    pub fn history(&self, key: &str) -> &[HistoryEntry] {
        self.tests.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn append(&mut self, key: &str, entry: HistoryEntry) {
        self.tests.entry(key.to_string()).or_default().push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Full overwrite of the backing file. A write failure is fatal:
    /// silently losing a run's history defeats the point of keeping one.
    pub fn persist(&self) -> Result<(), AnalyzerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.persist_err(e))?;
            }
        }

        let file = HistoryFile {
            tests: self.tests.clone(),
        };
        let out = fs::File::create(&self.path).map_err(|e| self.persist_err(e))?;
        serde_json::to_writer_pretty(out, &file)
            .map_err(|e| self.persist_err(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(())
    }

    fn persist_err(&self, source: std::io::Error) -> AnalyzerError {
        AnalyzerError::PersistFailure {
            path: self.path.clone(),
            source,
        }
    }

    /// Deletes the backing file.
    pub fn wipe(path: &Path) -> Result<(), AnalyzerError> {
        if path.exists() {
            fs::remove_file(path).map_err(|source| AnalyzerError::PersistFailure {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Status;
    use chrono::TimeZone;

    fn entry(status: Status, ts: i64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            status,
            reason: "r".to_string(),
            duration_ms: 10,
            flaky_pattern: false,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(&dir.path().join("none.json"), 5);
        assert!(store.is_empty());
        assert_eq!(store.stats_for("k", Utc::now()).total_runs(), 0);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-history.json");
        fs::write(&path, "{ not json").unwrap();
        let store = HistoryStore::load(&path, 5);
        assert!(store.is_empty());
    }

    #[test]
    fn round_trip_preserves_ordered_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-history.json");

        let mut store = HistoryStore::load(&path, 5);
        store.append("b.feature:2", entry(Status::Failed, 1));
        store.append("a.feature:1", entry(Status::Successful, 2));
        store.append("a.feature:1", entry(Status::Flaky, 3));
        store.persist().unwrap();

        let reloaded = HistoryStore::load(&path, 5);
        assert_eq!(reloaded.history("a.feature:1"), store.history("a.feature:1"));
        assert_eq!(reloaded.history("b.feature:2"), store.history("b.feature:2"));
    }

    #[test]
    fn persist_to_unwritable_path_is_a_persist_failure() {
        let dir = tempfile::tempdir().unwrap();
        // The backing path is itself a directory, so the write must fail.
        let path = dir.path().join("test-history.json");
        fs::create_dir_all(&path).unwrap();

        let mut store = HistoryStore::load(&path, 5);
        store.append("k", entry(Status::Successful, 1));
        assert!(matches!(
            store.persist(),
            Err(AnalyzerError::PersistFailure { .. })
        ));
    }

    #[test]
    fn persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/test-history.json");
        let mut store = HistoryStore::load(&path, 5);
        store.append("k", entry(Status::Successful, 1));
        store.persist().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn stats_ignore_entries_after_run_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(&dir.path().join("h.json"), 5);
        store.append("k", entry(Status::Successful, 100));
        store.append("k", entry(Status::Failed, 200));

        let run_start = Utc.timestamp_opt(150, 0).unwrap();
        let stats = store.stats_for("k", run_start);
        assert_eq!(stats.pass_count, 1);
        assert_eq!(stats.fail_count, 0);
    }

    #[test]
    fn stats_are_idempotent_without_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(&dir.path().join("h.json"), 5);
        store.append("k", entry(Status::Successful, 1));
        store.append("k", entry(Status::Failed, 2));

        let as_of = Utc.timestamp_opt(10, 0).unwrap();
        let a = store.stats_for("k", as_of);
        let b = store.stats_for("k", as_of);
        assert_eq!(a.pass_count, b.pass_count);
        assert_eq!(a.fail_count, b.fail_count);
        assert_eq!(a.last_passed, b.last_passed);
        assert_eq!(a.recent_trend, b.recent_trend);
    }

    #[test]
    fn counts_match_history_length_after_every_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::load(&dir.path().join("h.json"), 5);
        for i in 0..10 {
            let status = if i % 3 == 0 { Status::Failed } else { Status::Successful };
            store.append("k", entry(status, i));
            let stats = store.stats_for("k", Utc.timestamp_opt(1000, 0).unwrap());
            assert_eq!(stats.total_runs(), store.history("k").len());
        }
    }

    #[test]
    fn persisted_document_uses_tests_key_and_entry_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        let mut store = HistoryStore::load(&path, 5);
        store.append("f.feature:1", entry(Status::Successful, 1));
        store.persist().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let first = &raw["tests"]["f.feature:1"][0];
        assert_eq!(first["status"], "SUCCESSFUL");
        assert!(first.get("durationMs").is_some());
        assert!(first.get("flakyPattern").is_some());
    }
}
