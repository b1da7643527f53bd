//! User Connect
//!
//! Questions about the shopper's WooPay identity, answered by the user frame.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::channel::{ConnectChannel, ConnectKind, PostMessageTimeout};
use crate::error::Result;
use crate::frame::FrameHost;
use crate::message::MessageType;

const LOGGED_IN_TIMEOUT: Duration = Duration::from_secs(3);
const ENCRYPTED_DATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Shopper identity queries
pub struct UserConnect {
    channel: ConnectChannel,
}

impl UserConnect {
    pub fn new(
        host: Arc<dyn FrameHost>,
        woopay_host: &Url,
        timeout: PostMessageTimeout,
    ) -> Result<Self> {
        Ok(Self {
            channel: ConnectChannel::new(ConnectKind::User, host, woopay_host, timeout)?,
        })
    }

    pub fn channel(&self) -> &ConnectChannel {
        &self.channel
    }

    pub fn initialize(&self) -> Result<()> {
        self.channel.initialize()
    }

    /// Whether the shopper has an active WooPay login
    pub async fn is_user_logged_in(&self) -> Result<bool> {
        let result = self
            .channel
            .send_message(MessageType::GetIsUserLoggedIn, Value::Null, LOGGED_IN_TIMEOUT)
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Encrypted WooPay account data, or `None` when the shopper has no account yet
    pub async fn get_encrypted_data(&self) -> Result<Option<Value>> {
        let result = self
            .channel
            .send_message(MessageType::GetEncryptedData, Value::Null, ENCRYPTED_DATA_TIMEOUT)
            .await?;
        Ok(non_empty(result))
    }

    pub fn detach_message_listener(&self) {
        self.channel.detach_message_listener();
    }
}

fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameReply, InProcessFrameHost};
    use crate::message::OutboundMessage;
    use serde_json::json;

    const ORIGIN: &str = "https://pay.example";

    fn connect(responder: impl Fn(&OutboundMessage) -> Option<FrameReply> + Send + Sync + 'static) -> UserConnect {
        let host = Arc::new(InProcessFrameHost::new(ORIGIN, responder));
        UserConnect::new(host, &Url::parse(ORIGIN).unwrap(), PostMessageTimeout::new()).unwrap()
    }

    #[tokio::test]
    async fn test_is_user_logged_in() {
        let user = connect(|msg| match msg.message_type {
            MessageType::GetIsUserLoggedIn => Some(FrameReply::ok(json!(true))),
            _ => None,
        });
        assert!(user.is_user_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_non_boolean_means_logged_out() {
        let user = connect(|_| Some(FrameReply::ok(json!("yes"))));
        assert!(!user.is_user_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_no_account_is_empty_not_error() {
        let user = connect(|_| Some(FrameReply::ok(Value::Null)));
        assert_eq!(user.get_encrypted_data().await.unwrap(), None);

        let user = connect(|_| Some(FrameReply::ok(json!({}))));
        assert_eq!(user.get_encrypted_data().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_encrypted_data_passthrough() {
        let user = connect(|_| Some(FrameReply::ok(json!("opaque-blob"))));
        assert_eq!(
            user.get_encrypted_data().await.unwrap(),
            Some(json!("opaque-blob"))
        );
    }
}
