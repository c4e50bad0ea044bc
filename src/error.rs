//! Error types for amplitude-extract
//!
//! Failures fall into a small taxonomy:
//! - transient network/HTTP failures, retried by the chunk fetcher
//! - per-window failures (not found, retries exhausted), recovered by skipping the window
//! - extraction failures (unpack/decode), fatal for the run once every strategy failed
//! - input validation (dates, credentials), fatal before any I/O

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for amplitude-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for amplitude-extract
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_key")
        key: Option<String>,
    },

    /// A date string could not be parsed
    #[error("invalid date '{input}': {reason}")]
    InvalidDate {
        /// The raw input that failed to parse
        input: String,
        /// Parser error message
        reason: String,
    },

    /// Start date is after end date
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start date
        start: String,
        /// Requested end date
        end: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Export endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Status reason or response body excerpt
        message: String,
    },

    /// Archive unpacking or payload decoding failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// External tool execution failed (unzip, gunzip, wc)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Archive unpacking and payload decoding errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Outer archive could not be unpacked by a strategy
    #[error("unpack failed for {archive}: {reason}")]
    UnpackFailed {
        /// The staged archive
        archive: PathBuf,
        /// The reason unpacking failed
        reason: String,
    },

    /// Inner payload could not be decoded by a strategy
    #[error("decode failed for {entry}: {reason}")]
    DecodeFailed {
        /// The unpacked entry
        entry: PathBuf,
        /// The reason decoding failed
        reason: String,
    },

    /// Every configured strategy failed for the same input
    #[error("all {attempted} strategies failed for {path}: {last_error}")]
    AllStrategiesFailed {
        /// The archive or entry being processed
        path: PathBuf,
        /// Number of strategies tried
        attempted: usize,
        /// Error reported by the last strategy
        last_error: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
