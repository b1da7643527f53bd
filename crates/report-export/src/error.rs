//! Error Types for Report Export

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {path}")]
    Http { status: u16, path: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Export request returned no export_id")]
    MissingExportId,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExportError {
    /// Transport failures and server errors; the poller treats these as "not ready yet"
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Network(_) => true,
            ExportError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExportError::InvalidResponse(err.to_string())
        } else {
            ExportError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::InvalidResponse(err.to_string())
    }
}
