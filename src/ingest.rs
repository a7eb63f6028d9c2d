use crate::error::AnalyzerError;
use crate::identity::TestMetadata;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const MAX_REASON_LEN: usize = 200;

// How far below a scraped key we look for its error text.
const LOG_ERROR_WINDOW: usize = 10;

/// One normalized test result from a source, before identity resolution.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub meta: TestMetadata,
    pub passed: bool,
    pub reason: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

// Cucumber-style results document: an array of features, each holding
// scenario elements with per-step results. Unknown fields are ignored
// and missing ones default, since real documents vary by producer.
#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    elements: Vec<ElementDoc>,
}

#[derive(Debug, Deserialize)]
struct ElementDoc {
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    steps: Vec<StepDoc>,
}

#[derive(Debug, Deserialize)]
struct StepDoc {
    #[serde(default)]
    result: StepResultDoc,
}

#[derive(Debug, Deserialize, Default)]
struct StepResultDoc {
    #[serde(default)]
    status: String,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    error_message: Option<String>,
}

/// Reads a structured per-feature results document.
///
/// A scenario fails if any step is non-passing; the reason is the first
/// failing step's error text, reduced to its first non-blank line and
/// capped at 200 chars. Durations are summed over all steps and taken
/// as milliseconds as-is (unit conversion is the producer's concern).
pub fn results_document(path: &Path) -> Result<Vec<ScenarioOutcome>, AnalyzerError> {
    let content = fs::read_to_string(path).map_err(|e| {
        AnalyzerError::SourceUnavailable(format!("{}: {}", path.display(), e))
    })?;

    let features: Vec<FeatureDoc> = serde_json::from_str(&content).map_err(|e| {
        AnalyzerError::SourceUnavailable(format!("{}: not a results document: {}", path.display(), e))
    })?;

    let now = Utc::now();
    let mut outcomes = Vec::new();
    for feature in features {
        let uri = feature.uri.or(feature.path);
        for element in feature.elements {
            let meta = TestMetadata {
                uri: uri.clone(),
                line: element.line,
                name: Some(element.name.clone()),
            };

            let mut passed = true;
            let mut reason = None;
            let mut duration_ms: u64 = 0;
            for step in &element.steps {
                duration_ms += step.result.duration;
                if !step.result.status.eq_ignore_ascii_case("passed") {
                    passed = false;
                    if reason.is_none() {
                        reason = step
                            .result
                            .error_message
                            .as_deref()
                            .and_then(concise_reason);
                    }
                }
            }

            outcomes.push(ScenarioOutcome {
                meta,
                passed,
                reason,
                duration_ms,
                timestamp: now,
            });
        }
    }

    if outcomes.is_empty() {
        return Err(AnalyzerError::SourceUnavailable(format!(
            "{}: document holds no scenarios",
            path.display()
        )));
    }
    Ok(outcomes)
}

/// Live per-test event adapter: pair start and finish events, then
/// collect outcomes in finish order when the run ends.
#[derive(Debug, Default)]
pub struct RunListener {
    started: HashMap<TestMetadata, DateTime<Utc>>,
    finished: Vec<ScenarioOutcome>,
}

impl RunListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_started(&mut self, meta: TestMetadata) {
        self.started.insert(meta, Utc::now());
    }

    pub fn test_finished(&mut self, meta: TestMetadata, passed: bool, message: Option<String>) {
        let now = Utc::now();
        let duration_ms = self
            .started
            .remove(&meta)
            .map(|start| (now - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        let reason = match message {
            Some(m) => concise_reason(&m),
            None if passed => Some("Passed".to_string()),
            None => None,
        };
        self.finished.push(ScenarioOutcome {
            meta,
            passed,
            reason,
            duration_ms,
            timestamp: now,
        });
    }

    pub fn run_finished(self) -> Result<Vec<ScenarioOutcome>, AnalyzerError> {
        if self.finished.is_empty() {
            return Err(AnalyzerError::SourceUnavailable(
                "no test events were observed".to_string(),
            ));
        }
        Ok(self.finished)
    }
}

/// Scrapes failed-scenario locators out of raw console text.
///
/// Every scraped key counts as a failure; the reason is the first line
/// near the locator that mentions an Exception or Error, else
/// "No detailed error found".
pub fn console_log(text: &str) -> Result<Vec<ScenarioOutcome>, AnalyzerError> {
    let key_re = Regex::new(r"classpath:[^\s]+\.feature:\d+").unwrap();
    let lines: Vec<&str> = text.lines().collect();

    // First occurrence line per key, in first-seen order.
    let mut seen: Vec<(String, usize)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        for m in key_re.find_iter(line) {
            let key = m.as_str().to_string();
            if !seen.iter().any(|(k, _)| *k == key) {
                seen.push((key, idx));
            }
        }
    }

    if seen.is_empty() {
        return Err(AnalyzerError::SourceUnavailable(
            "no test locators found in console log".to_string(),
        ));
    }

    let now = Utc::now();
    let outcomes = seen
        .into_iter()
        .map(|(locator, idx)| {
            let reason = nearby_error_text(&lines, idx)
                .unwrap_or_else(|| "No detailed error found".to_string());
            // Split `uri:line` back apart so the resolver sees structure.
            let (uri, line) = match locator.rsplit_once(':') {
                Some((u, l)) => (u.to_string(), l.parse().unwrap_or(0)),
                None => (locator.clone(), 0),
            };
            ScenarioOutcome {
                meta: TestMetadata::locator(uri, line),
                passed: false,
                reason: Some(reason),
                duration_ms: 0,
                timestamp: now,
            }
        })
        .collect();
    Ok(outcomes)
}

// Scan starts below the locator's own line so surrounding text on that
// line (e.g. "Error at classpath:...") is never taken as the reason.
fn nearby_error_text(lines: &[&str], from: usize) -> Option<String> {
    let start = (from + 1).min(lines.len());
    let end = (from + 1 + LOG_ERROR_WINDOW).min(lines.len());
    lines[start..end]
        .iter()
        .find(|l| l.contains("Exception") || l.contains("Error"))
        .and_then(|l| concise_reason(l))
}

/// First non-blank line of an error blob, truncated to 200 chars.
fn concise_reason(full: &str) -> Option<String> {
    let line = full.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.len() > MAX_REASON_LEN {
        let mut cut = MAX_REASON_LEN;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        Some(format!("{}...", &line[..cut]))
    } else {
        Some(line.to_string())
    }
}
