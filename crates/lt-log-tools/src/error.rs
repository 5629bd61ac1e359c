//! Log toolkit error types.

use thiserror::Error;

/// Errors that can occur while analysing or pruning log files.
///
/// Most read-path failures never reach callers as errors: a missing file
/// counts as zero records and an unresolvable destination becomes a zero
/// placeholder in aggregates. These variants cover what remains.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("source not found: {0}")]
    NotFound(String),

    #[error("cannot resolve destination '{destination}': {reason}")]
    Resolution { destination: String, reason: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("invalid retention action '{0}' (expected 'latest' or 'all')")]
    InvalidAction(String),

    #[error("unknown severity: {0}")]
    UnknownSeverity(String),
}

impl LogError {
    pub fn resolution(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for log toolkit results.
pub type LogResult<T> = Result<T, LogError>;
