//! Direct Checkout Error Types

use thiserror::Error;
use woopay_connect::ConnectError;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Direct checkout errors
///
/// `Clone` so one prefetch outcome can be handed to every reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Connect frame request failed
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Store AJAX request failed
    #[error("Store request failed: {0}")]
    Backend(String),

    /// Session bundle missing one of blog_id/session/iv/hash
    #[error("Could not retrieve encrypted session data from store")]
    InvalidSessionData,

    /// No redirect URL could be produced
    #[error("Could not retrieve WooPay checkout URL")]
    MissingRedirectUrl,

    /// Redirect URL failed the origin/parameter check
    #[error("Invalid WooPay session URL: {0}")]
    InvalidRedirectUrl(String),

    /// Reachability check answered "no"
    #[error("WooPay is currently not available")]
    WooPayUnreachable,

    /// Prefetch task died before producing a result
    #[error("Session data prefetch failed: {0}")]
    Prefetch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Connect(err) => err.is_retryable(),
            CheckoutError::Backend(_) | CheckoutError::Prefetch(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::Backend(err.to_string())
    }
}
