use crate::outcome::{ExecutionOutcome, HistoryEntry, Status, TestStats};
use serde::{Deserialize, Serialize};

/// Substrings that indicate a transient infrastructure failure rather
/// than a genuinely broken test. Matched case-insensitively against the
/// failure reason.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "element not found",
    "stale element reference",
    "element not interactable",
    "connection refused",
    "connectexception",
    "element not visible",
];

/// When does a failure count as flaky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlakyRule {
    /// Transient pattern OR at least one historical pass (default).
    #[default]
    Either,
    /// Transient pattern AND at least one historical pass.
    Both,
}

/// Closed vocabulary of transient-failure indicators. Fixed at load
/// time: config may append substrings, nothing is inferred from data.
#[derive(Debug, Clone)]
pub struct PatternVocabulary {
    patterns: Vec<String>,
}

impl PatternVocabulary {
    pub fn new(extra: &[String]) -> Self {
        let patterns = TRANSIENT_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().map(|p| p.to_lowercase()))
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, reason: &str) -> bool {
        let lower = reason.to_lowercase();
        if self.patterns.iter().any(|p| lower.contains(p)) {
            return true;
        }
        // Assertion failures about the current URL are almost always a
        // page that had not finished navigating.
        lower.contains("assert") && lower.contains("url")
    }
}

impl Default for PatternVocabulary {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Decides PASSED / FLAKY / FAILED for one outcome given the prior
/// stats for its key. Pure: no I/O, deterministic in its inputs.
pub fn classify(
    outcome: &ExecutionOutcome,
    prior: &TestStats,
    vocab: &PatternVocabulary,
    rule: FlakyRule,
) -> HistoryEntry {
    let reason = outcome.reason.clone().unwrap_or_else(|| {
        if outcome.passed { "Passed" } else { "Failed" }.to_string()
    });

    let (status, flaky_pattern) = if outcome.passed {
        (Status::Successful, false)
    } else {
        let pattern = vocab.matches(&reason);
        let passed_before = prior.pass_count > 0;
        let flaky = match rule {
            FlakyRule::Either => pattern || passed_before,
            FlakyRule::Both => pattern && passed_before,
        };
        if flaky {
            (Status::Flaky, true)
        } else {
            (Status::Failed, false)
        }
    };

    HistoryEntry {
        timestamp: outcome.timestamp,
        status,
        reason,
        duration_ms: outcome.duration_ms,
        flaky_pattern,
    }
}
