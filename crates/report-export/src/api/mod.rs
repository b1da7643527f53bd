//! REST API Access
//!
//! The export endpoints are addressed by path, the way WordPress `apiFetch`
//! does it: the implementation owns the base URL and authentication.

mod http;
mod mock;

pub use http::HttpApiFetch;
pub use mock::{export_ready, server_error, ApiCall, MockApiFetch};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// REST client trait
#[async_trait]
pub trait ApiFetch: Send + Sync {
    /// POST a JSON body, returning the decoded JSON response
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// GET, returning the decoded JSON response
    async fn get(&self, path: &str) -> Result<Value>;
}
