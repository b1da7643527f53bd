//! Error Types

use thiserror::Error;

/// Result type alias for connect operations
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Connect channel error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// No correlated response arrived in time
    #[error("No response to '{message_type}' within {timeout_ms}ms")]
    Timeout { message_type: String, timeout_ms: u64 },

    /// The frame answered with an unsuccessful response
    #[error("Frame rejected request: {0}")]
    Rejected(String),

    /// The frame could not be created or posted to
    #[error("Frame error: {0}")]
    Frame(String),

    /// The pending entry was dropped before a response arrived
    #[error("Channel closed before a response arrived")]
    Closed,

    /// Response payload did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(String),
}

impl ConnectError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Timeout { .. } | ConnectError::Closed)
    }
}

impl From<serde_json::Error> for ConnectError {
    fn from(err: serde_json::Error) -> Self {
        ConnectError::Json(err.to_string())
    }
}
