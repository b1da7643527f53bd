//! Frame Messages
//!
//! Wire format exchanged with the WooPay connect frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectError, Result};

/// Request types understood by the connect frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    GetIsUserLoggedIn,
    GetEncryptedData,
    GetIsWoopayReachable,
    GetIsThirdPartyCookiesEnabled,
    GetPostMessageTimeout,
    SendRedirectSessionData,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::GetIsUserLoggedIn => "get_is_user_logged_in",
            MessageType::GetEncryptedData => "get_encrypted_data",
            MessageType::GetIsWoopayReachable => "get_is_woopay_reachable",
            MessageType::GetIsThirdPartyCookiesEnabled => "get_is_third_party_cookies_enabled",
            MessageType::GetPostMessageTimeout => "get_post_message_timeout",
            MessageType::SendRedirectSessionData => "send_redirect_session_data",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request posted to a frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Correlation ID
    pub id: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    #[serde(default)]
    pub payload: Value,
}

impl OutboundMessage {
    pub fn new(id: impl Into<String>, message_type: MessageType, payload: Value) -> Self {
        Self {
            id: id.into(),
            message_type,
            payload,
        }
    }
}

/// A correlated response received from a frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl InboundMessage {
    /// Build a successful response
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Build a failed response
    pub fn failed(id: impl Into<String>, error: Value) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// Parse raw event data; anything not shaped like a response yields `None`
    pub fn parse(data: &Value) -> Option<Self> {
        let message: Self = serde_json::from_value(data.clone()).ok()?;
        if message.id.is_empty() {
            return None;
        }
        Some(message)
    }

    /// Convert into the outcome delivered to the waiting caller
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            return Ok(self.result.unwrap_or(Value::Null));
        }

        let reason = match self.error {
            Some(Value::String(reason)) => reason,
            Some(other) => other.to_string(),
            None => "unknown error".into(),
        };
        Err(ConnectError::Rejected(reason))
    }
}
