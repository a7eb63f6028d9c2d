use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the classification pipeline.
///
/// Everything except `PersistFailure` is recoverable: the pipeline
/// degrades to empty/partial results instead of aborting the run.
/// Losing a run's history on write is the one failure that defeats the
/// tool's purpose, so it is surfaced as a hard error.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Input document/stream missing or empty. Skip classification for
    /// this run; history is left untouched.
    #[error("results source unavailable: {0}")]
    SourceUnavailable(String),

    /// Persisted history unreadable. Treated as empty history.
    #[error("history file {} is unreadable: {detail}", path.display())]
    MalformedHistory { path: PathBuf, detail: String },

    /// No stable key derivable for a test. The outcome is dropped from
    /// classification and reported separately; a random key would break
    /// all cross-run correlation.
    #[error("no stable identity for test: {0}")]
    UnresolvableIdentity(String),

    /// History could not be written back. Fatal.
    #[error("failed to persist test history to {}", path.display())]
    PersistFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
