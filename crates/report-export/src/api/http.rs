//! HTTP API Client
//!
//! `ApiFetch` over a WordPress REST root such as `https://shop.example/wp-json`.

use async_trait::async_trait;
use serde_json::Value;

use super::ApiFetch;
use crate::error::{ExportError, Result};

const NONCE_HEADER: &str = "X-WP-Nonce";

pub struct HttpApiFetch {
    client: reqwest::Client,
    base_url: String,
    nonce: Option<String>,
}

impl HttpApiFetch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            nonce: None,
        }
    }

    /// Send `X-WP-Nonce` with every request
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Absolute URL for an API path
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, path: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let request = match &self.nonce {
            Some(nonce) => request.header(NONCE_HEADER, nonce),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Http {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ApiFetch for HttpApiFetch {
    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        tracing::debug!(path, "POST");
        let request = self.client.post(self.url_for(path)).json(body);
        self.send(path, request).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        tracing::debug!(path, "GET");
        let request = self.client.get(self.url_for(path));
        self.send(path, request).await
    }
}
