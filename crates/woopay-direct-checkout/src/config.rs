//! Direct Checkout Configuration
//!
//! Parsed from the JSON globals the store prints into the page.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CheckoutError, Result};
use crate::session_data::EncryptedSessionData;

fn default_enabled() -> bool {
    true
}

/// Configuration handed to the orchestrator at construction time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectCheckoutConfig {
    /// WooPay base URL, e.g. `https://pay.woo.com`
    pub woopay_host: String,

    /// Store AJAX endpoint; may contain the `%%endpoint%%` placeholder
    pub ajax_url: String,

    /// Nonce sent as `_ajax_nonce`
    #[serde(default)]
    pub nonce: String,

    #[serde(default)]
    pub is_product_page: bool,

    /// Minimum session bundle embedded in the page, if the store printed one
    #[serde(default, alias = "woopayMinimumSessionData")]
    pub minimum_session_data: Option<EncryptedSessionData>,

    #[serde(default = "default_enabled", rename = "isWooPayEnabled")]
    pub is_woopay_enabled: bool,
}

impl DirectCheckoutConfig {
    pub fn new(woopay_host: impl Into<String>, ajax_url: impl Into<String>) -> Self {
        Self {
            woopay_host: woopay_host.into(),
            ajax_url: ajax_url.into(),
            nonce: String::new(),
            is_product_page: false,
            minimum_session_data: None,
            is_woopay_enabled: true,
        }
    }

    /// Parse and validate the page globals JSON
    pub fn from_page_globals(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CheckoutError::Config(format!("invalid page globals: {e}")))?;
        config.woopay_host_url()?;
        Ok(config)
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    pub fn with_product_page(mut self, is_product_page: bool) -> Self {
        self.is_product_page = is_product_page;
        self
    }

    pub fn with_minimum_session_data(mut self, data: EncryptedSessionData) -> Self {
        self.minimum_session_data = Some(data);
        self
    }

    /// The WooPay host as an absolute http(s) URL
    pub fn woopay_host_url(&self) -> Result<Url> {
        let url = Url::parse(&self.woopay_host)
            .map_err(|e| CheckoutError::Config(format!("woopayHost '{}': {e}", self.woopay_host)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(CheckoutError::Config(format!(
                "woopayHost '{}' must be an http(s) URL",
                self.woopay_host
            )));
        }
        Ok(url)
    }
}
