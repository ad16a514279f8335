//! Error handling for the table-storage client
//!
//! This module defines the single error type the crate exposes. Service-side
//! and transport-side failures are normalized here; callers never see the
//! underlying HTTP client's error type directly.

use thiserror::Error;

/// Result type alias for the table-storage client
pub type Result<T> = std::result::Result<T, TableError>;

/// Main error type for the table-storage client
#[derive(Error, Debug)]
pub enum TableError {
    /// Malformed input caught locally before any network call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The service refused the entire atomic transaction; nothing was applied
    #[error("Batch rejected by service (operation {index}): HTTP {status} {code}: {message}")]
    BatchRejected {
        /// Zero-based index of the failing operation within the batch
        index: usize,
        /// HTTP status code reported by the service
        status: u16,
        /// Service error code (e.g. `ResourceNotFound`)
        code: String,
        /// Human-readable message from the service
        message: String,
    },

    /// Connectivity or protocol failure below the batch semantics
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A response body the demultiplexer cannot interpret
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Payload encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TableError {
    fn from(error: reqwest::Error) -> Self {
        TableError::Transport(error.to_string())
    }
}

impl TableError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Only transport failures qualify: a rejected batch must not be resent
    /// blindly because Insert operations are not idempotent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TableError::Transport(_))
    }

    /// Whether the error was raised locally, before any network activity
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TableError::InvalidArgument(_))
    }

    /// The HTTP status code carried by the error, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            TableError::BatchRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
