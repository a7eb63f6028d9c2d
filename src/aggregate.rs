use crate::classify::{classify, FlakyRule, PatternVocabulary};
use crate::history::HistoryStore;
use crate::ingest::ScenarioOutcome;
use crate::outcome::{
    ExecutionOutcome, HistoryEntry, RunTotals, SummaryRow, TestStats, Verdict,
};
use chrono::{DateTime, Utc};

/// Per-run state threaded explicitly through the pipeline: summary rows
/// in first-observed order, run totals, and outcomes dropped for lack
/// of a stable identity. One context per run, no shared counters.
pub struct RunContext {
    started_at: DateTime<Utc>,
    trend_window: usize,
    rows: Vec<SummaryRow>,
    skipped: Vec<String>,
    totals: RunTotals,
}

impl RunContext {
    pub fn new(started_at: DateTime<Utc>, trend_window: usize) -> Self {
        Self {
            started_at,
            trend_window,
            rows: Vec::new(),
            skipped: Vec::new(),
            totals: RunTotals::default(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Runs one outcome through stats -> classify -> append -> summarize.
    pub fn record(
        &mut self,
        store: &mut HistoryStore,
        vocab: &PatternVocabulary,
        rule: FlakyRule,
        key: String,
        scenario: ScenarioOutcome,
    ) {
        let outcome = ExecutionOutcome {
            key: key.clone(),
            passed: scenario.passed,
            reason: scenario.reason,
            duration_ms: scenario.duration_ms,
            timestamp: scenario.timestamp,
        };

        let prior = store.stats_for(&key, self.started_at);
        let entry = classify(&outcome, &prior, vocab, rule);
        store.append(&key, entry.clone());

        let row = summarize(&key, store.history(&key), &entry, self.trend_window);
        self.totals.total += 1;
        match row.verdict {
            Verdict::Passed => self.totals.passed += 1,
            Verdict::Flaky => self.totals.flaky += 1,
            Verdict::Failed => self.totals.failed += 1,
        }
        self.rows.push(row);
    }

    /// Records an outcome that could not be given a stable key; it is
    /// reported separately instead of classified.
    pub fn skip(&mut self, detail: String) {
        self.skipped.push(detail);
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }
}

/// Builds the summary row for one key from its history including the
/// just-appended entry, so last-passed and stability reflect this run.
pub fn summarize(
    key: &str,
    history: &[HistoryEntry],
    new_entry: &HistoryEntry,
    trend_window: usize,
) -> SummaryRow {
    let stats = TestStats::from_entries(history, trend_window);
    SummaryRow {
        key: key.to_string(),
        verdict: Verdict::from_status(new_entry.status),
        last_passed: stats.last_passed,
        reason: new_entry.reason.clone(),
        stability_percent: stats.stability_percent(),
        recent_trend: stats.recent_trend,
    }
}
