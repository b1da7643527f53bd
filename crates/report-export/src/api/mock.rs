//! Mock API Client
//!
//! For testing and demo purposes. Answers from scripted responses and records
//! every call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::ApiFetch;
use crate::error::{ExportError, Result};
use crate::lock;

/// A recorded request
#[derive(Clone, Debug, PartialEq)]
pub struct ApiCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// Scripted API client
///
/// POSTs answer with the configured creation response. GETs pop the next
/// scripted poll response; once the script runs out they answer
/// `{"status": "pending"}`.
pub struct MockApiFetch {
    post_response: Result<Value>,
    post_delay: Duration,
    get_responses: Mutex<VecDeque<Result<Value>>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl Default for MockApiFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApiFetch {
    /// Creation succeeds with export id `"123"`
    pub fn new() -> Self {
        Self {
            post_response: Ok(json!({ "export_id": "123" })),
            post_delay: Duration::ZERO,
            get_responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_post_response(mut self, response: Result<Value>) -> Self {
        self.post_response = response;
        self
    }

    /// Hold every POST for `delay` before answering
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    /// Queue a poll response
    pub fn then_get(self, response: Result<Value>) -> Self {
        lock(&self.get_responses).push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, method: &'static str, path: &str, body: Option<&Value>) {
        lock(&self.calls).push(ApiCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
    }
}

#[async_trait]
impl ApiFetch for MockApiFetch {
    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("POST", path, Some(body));
        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }
        self.post_response.clone()
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.record("GET", path, None);
        lock(&self.get_responses)
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "pending" })))
    }
}

/// Poll response for a finished export
pub fn export_ready(download_url: &str) -> Result<Value> {
    Ok(json!({ "status": "success", "download_url": download_url }))
}

/// Poll response for a backend failure
pub fn server_error(path: &str) -> Result<Value> {
    Err(ExportError::Http {
        status: 500,
        path: path.to_string(),
    })
}
