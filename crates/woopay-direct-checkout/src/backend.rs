//! Store Session Backend
//!
//! The store's AJAX endpoints that issue WooPay session bundles.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::{CheckoutError, Result};
use crate::session_data::EncryptedSessionData;

const ENDPOINT_PLACEHOLDER: &str = "%%endpoint%%";

pub const GET_WOOPAY_SESSION: &str = "get_woopay_session";
pub const GET_WOOPAY_MINIMUM_SESSION_DATA: &str = "get_woopay_minimum_session_data";

/// Store endpoints that issue session bundles
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Full session bundle for a logged-in shopper
    async fn get_woopay_session(&self, encrypted_data: Option<&Value>)
        -> Result<EncryptedSessionData>;

    /// Minimum bundle used to start a WooPay session from scratch
    async fn get_woopay_minimum_session_data(&self) -> Result<EncryptedSessionData>;
}

/// Build the AJAX URL for an action
///
/// WooCommerce-style URLs carry a `%%endpoint%%` placeholder that is replaced
/// with `wcpay_{action}`; anything else gets `action={action}` appended.
pub fn build_ajax_url(ajax_url: &str, action: &str) -> Result<String> {
    if ajax_url.contains(ENDPOINT_PLACEHOLDER) {
        return Ok(ajax_url.replace(ENDPOINT_PLACEHOLDER, &format!("wcpay_{action}")));
    }

    let mut url = Url::parse(ajax_url)
        .map_err(|e| CheckoutError::Config(format!("ajaxUrl '{ajax_url}': {e}")))?;
    url.query_pairs_mut().append_pair("action", action);
    Ok(url.into())
}

/// `SessionBackend` over the store's AJAX endpoints
pub struct AjaxSessionBackend {
    client: reqwest::Client,
    ajax_url: String,
    nonce: String,
}

impl AjaxSessionBackend {
    pub fn new(ajax_url: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), ajax_url, nonce)
    }

    pub fn with_client(
        client: reqwest::Client,
        ajax_url: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            client,
            ajax_url: ajax_url.into(),
            nonce: nonce.into(),
        }
    }

    async fn post(&self, action: &str, mut form: Vec<(&str, String)>) -> Result<EncryptedSessionData> {
        let url = build_ajax_url(&self.ajax_url, action)?;
        form.push(("_ajax_nonce", self.nonce.clone()));

        let response = self.client.post(&url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(CheckoutError::Backend(format!(
                "{action} returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        tracing::debug!(action, "Received session data from store");
        Ok(EncryptedSessionData::from(body))
    }
}

#[async_trait]
impl SessionBackend for AjaxSessionBackend {
    async fn get_woopay_session(
        &self,
        encrypted_data: Option<&Value>,
    ) -> Result<EncryptedSessionData> {
        let mut form = Vec::new();
        if let Some(data) = encrypted_data {
            let value = match data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form.push(("encrypted_data", value));
        }
        self.post(GET_WOOPAY_SESSION, form).await
    }

    async fn get_woopay_minimum_session_data(&self) -> Result<EncryptedSessionData> {
        self.post(GET_WOOPAY_MINIMUM_SESSION_DATA, Vec::new()).await
    }
}
