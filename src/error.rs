//! Error types for eventwatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in eventwatch
#[derive(Debug, Error)]
pub enum WatchError {
    /// Poll interval must be strictly positive
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The injected fetch reported a failure
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for eventwatch operations
pub type Result<T> = std::result::Result<T, WatchError>;
