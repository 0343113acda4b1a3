//! Error type shared by every part of the library.
//!
//! Transient sensor unavailability is deliberately absent here: an unreadable
//! sensor produces an empty sample, never an `Error`.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid level specification '{spec}': {reason}")]
    InvalidLevels { spec: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("load generator `{command}` failed: {status}")]
    LoadGenerator { command: String, status: String },

    /// The output sink failed while sampling was already running.
    #[error("output sink failed: {0}")]
    SinkFailed(String),

    #[error("sampler was already started")]
    AlreadyStarted,

    #[error("sampler is not running")]
    NotRunning,

    #[error("interrupted")]
    Interrupted,
}

impl Error {
    pub(crate) fn levels(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLevels {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}
