//! Error types for har-recorder

use std::io;
use thiserror::Error;

/// Result type for har-recorder operations
pub type Result<T> = std::result::Result<T, HarError>;

/// Errors that can occur in har-recorder
///
/// Capture itself never fails: incomplete or unmatched data is dropped or
/// left pending. These errors cover the surfaces around the core.
#[derive(Debug, Error)]
pub enum HarError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No page is present in the live window
    #[error("No current page: no navigation observed or all pages pruned")]
    NoCurrentPage,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed line in a capture log
    #[error("Invalid capture event at line {line}: {reason}")]
    InvalidEvent {
        /// 1-based line number
        line: usize,
        /// Parser message
        reason: String,
    },

    /// The recorder service task is no longer running
    #[error("Recorder service closed")]
    ServiceClosed,
}

impl From<serde_json::Error> for HarError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
