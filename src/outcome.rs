use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted status of one history entry.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Successful,
    Flaky,
    Failed,
}

/// Per-run verdict shown in summaries. History files say SUCCESSFUL,
/// summary rows say PASSED.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Passed,
    Flaky,
    Failed,
}

impl Verdict {
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::Successful => Verdict::Passed,
            Status::Flaky => Verdict::Flaky,
            Status::Failed => Verdict::Failed,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Flaky => write!(f, "FLAKY"),
            Verdict::Failed => write!(f, "FAILED"),
        }
    }
}

/// One test's result for the current run. Immutable after creation.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub key: String,                  // Stable cross-run identifier
    pub passed: bool,                 // Did the test pass this run
    pub reason: Option<String>,       // Failure text, if any
    pub duration_ms: u64,             // Execution duration (milliseconds)
    pub timestamp: DateTime<Utc>,     // When the outcome was observed
}

/// One persisted record of a past outcome. Field names match the
/// history document format; entries are append-only and never mutated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub reason: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "flakyPattern")]
    pub flaky_pattern: bool,
}

/// Statistics derived from a key's history. Recomputed on every query,
/// never persisted or cached across runs.
#[derive(Debug, Clone, Default)]
pub struct TestStats {
    pub pass_count: usize,
    pub fail_count: usize,
    pub last_passed: Option<DateTime<Utc>>,
    /// Last `trend_window` entries in chronological order, true = passed.
    pub recent_trend: Vec<bool>,
}

impl TestStats {
    pub fn from_entries(entries: &[HistoryEntry], trend_window: usize) -> Self {
        let mut stats = TestStats::default();
        for entry in entries {
            if entry.status == Status::Successful {
                stats.pass_count += 1;
                stats.last_passed = Some(entry.timestamp);
            } else {
                stats.fail_count += 1;
            }
        }
        let skip = entries.len().saturating_sub(trend_window);
        stats.recent_trend = entries[skip..]
            .iter()
            .map(|e| e.status == Status::Successful)
            .collect();
        stats
    }

    pub fn total_runs(&self) -> usize {
        self.pass_count + self.fail_count
    }

    /// 100 * pass / (pass + fail); 0 when the history is empty.
    pub fn stability_percent(&self) -> f64 {
        let total = self.total_runs();
        if total == 0 {
            0.0
        } else {
            self.pass_count as f64 * 100.0 / total as f64
        }
    }
}

/// One row of the run summary handed to an external report renderer.
#[derive(Debug, Serialize, Clone)]
pub struct SummaryRow {
    pub key: String,
    pub verdict: Verdict,
    #[serde(rename = "lastPassed")]
    pub last_passed: Option<DateTime<Utc>>,
    pub reason: String,
    #[serde(rename = "stabilityPercent")]
    pub stability_percent: f64,
    #[serde(rename = "recentTrend")]
    pub recent_trend: Vec<bool>,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub total: usize,
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(status: Status, ts: i64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            status,
            reason: "x".to_string(),
            duration_ms: 1,
            flaky_pattern: status == Status::Flaky,
        }
    }

    #[test]
    fn stats_count_every_entry() {
        let entries = vec![
            entry(Status::Successful, 1),
            entry(Status::Flaky, 2),
            entry(Status::Failed, 3),
            entry(Status::Successful, 4),
        ];
        let stats = TestStats::from_entries(&entries, 5);
        assert_eq!(stats.pass_count, 2);
        assert_eq!(stats.fail_count, 2);
        assert_eq!(stats.total_runs(), entries.len());
        assert_eq!(stats.last_passed, Some(Utc.timestamp_opt(4, 0).unwrap()));
        assert_eq!(stats.stability_percent(), 50.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = TestStats::from_entries(&[], 5);
        assert_eq!(stats.stability_percent(), 0.0);
        assert!(stats.recent_trend.is_empty());
        assert!(stats.last_passed.is_none());
    }

    #[test]
    fn trend_keeps_last_window_in_order() {
        let entries: Vec<_> = (0..7)
            .map(|i| {
                entry(
                    if i % 2 == 0 { Status::Successful } else { Status::Failed },
                    i,
                )
            })
            .collect();
        let stats = TestStats::from_entries(&entries, 5);
        // Entries 2..7: pass, fail, pass, fail, pass
        assert_eq!(stats.recent_trend, vec![true, false, true, false, true]);
    }

    #[test]
    fn stability_grows_with_passes() {
        let mut entries = vec![entry(Status::Failed, 0)];
        let mut last = TestStats::from_entries(&entries, 5).stability_percent();
        for i in 1..5 {
            entries.push(entry(Status::Successful, i));
            let now = TestStats::from_entries(&entries, 5).stability_percent();
            assert!(now > last);
            last = now;
        }
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Status::Successful).unwrap(),
            "\"SUCCESSFUL\""
        );
        assert_eq!(serde_json::to_string(&Status::Flaky).unwrap(), "\"FLAKY\"");
        assert_eq!(serde_json::to_string(&Verdict::Passed).unwrap(), "\"PASSED\"");
    }
}
