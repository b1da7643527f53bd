//! Session Connect
//!
//! Store-level questions about WooPay availability, plus the redirect session
//! handoff. Everything here goes through the session frame.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::channel::{ConnectChannel, ConnectKind, PostMessageTimeout};
use crate::error::{ConnectError, Result};
use crate::frame::FrameHost;
use crate::message::MessageType;

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);
const CONFIG_TIMEOUT: Duration = Duration::from_secs(3);
const REDIRECT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// WooPay's answer to a redirect session handoff
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectSession {
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Store configuration and redirect session queries
pub struct SessionConnect {
    channel: ConnectChannel,
}

impl SessionConnect {
    pub fn new(
        host: Arc<dyn FrameHost>,
        woopay_host: &Url,
        timeout: PostMessageTimeout,
    ) -> Result<Self> {
        Ok(Self {
            channel: ConnectChannel::new(ConnectKind::Session, host, woopay_host, timeout)?,
        })
    }

    pub fn channel(&self) -> &ConnectChannel {
        &self.channel
    }

    pub fn initialize(&self) -> Result<()> {
        self.channel.initialize()
    }

    pub async fn is_woopay_reachable(&self) -> Result<bool> {
        let result = self
            .channel
            .send_message(MessageType::GetIsWoopayReachable, Value::Null, REACHABILITY_TIMEOUT)
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn is_woopay_third_party_cookies_enabled(&self) -> Result<bool> {
        let result = self
            .channel
            .send_message(
                MessageType::GetIsThirdPartyCookiesEnabled,
                Value::Null,
                CONFIG_TIMEOUT,
            )
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Timeout WooPay wants for post messages, if it specifies one (milliseconds on the wire)
    pub async fn get_post_message_timeout(&self) -> Result<Option<Duration>> {
        let result = self
            .channel
            .send_message(MessageType::GetPostMessageTimeout, Value::Null, CONFIG_TIMEOUT)
            .await?;
        Ok(result
            .as_u64()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }

    /// Register a redirect session on WooPay's side
    ///
    /// Each call registers a new session, so callers must not retry it blindly.
    pub async fn send_redirect_session_data_to_woopay<T: Serialize + ?Sized>(
        &self,
        encrypted_session_data: &T,
    ) -> Result<RedirectSession> {
        let payload = serde_json::to_value(encrypted_session_data)?;
        let result = self
            .channel
            .send_message(
                MessageType::SendRedirectSessionData,
                payload,
                REDIRECT_SESSION_TIMEOUT,
            )
            .await?;

        match result {
            Value::Null => Ok(RedirectSession::default()),
            other => serde_json::from_value(other)
                .map_err(|e| ConnectError::UnexpectedResponse(e.to_string())),
        }
    }

    pub fn detach_message_listener(&self) {
        self.channel.detach_message_listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameReply, InProcessFrameHost};
    use crate::message::OutboundMessage;
    use serde_json::json;

    const ORIGIN: &str = "https://pay.example";

    fn connect(responder: impl Fn(&OutboundMessage) -> Option<FrameReply> + Send + Sync + 'static) -> (Arc<InProcessFrameHost>, SessionConnect) {
        let host = Arc::new(InProcessFrameHost::new(ORIGIN, responder));
        let session =
            SessionConnect::new(host.clone(), &Url::parse(ORIGIN).unwrap(), PostMessageTimeout::new())
                .unwrap();
        (host, session)
    }

    #[tokio::test]
    async fn test_reachability_and_cookies() {
        let (_, session) = connect(|msg| match msg.message_type {
            MessageType::GetIsWoopayReachable => Some(FrameReply::ok(json!(true))),
            MessageType::GetIsThirdPartyCookiesEnabled => Some(FrameReply::ok(json!(false))),
            _ => None,
        });
        assert!(session.is_woopay_reachable().await.unwrap());
        assert!(!session.is_woopay_third_party_cookies_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_post_message_timeout() {
        let (_, session) = connect(|_| Some(FrameReply::ok(json!(1500))));
        assert_eq!(
            session.get_post_message_timeout().await.unwrap(),
            Some(Duration::from_millis(1500))
        );

        let (_, session) = connect(|_| Some(FrameReply::ok(Value::Null)));
        assert_eq!(session.get_post_message_timeout().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redirect_session_sent_once() {
        let (host, session) = connect(|msg| {
            Some(FrameReply::ok(json!({
                "redirect_url": format!("https://pay.example/?platform_checkout_key={}", msg.payload["blog_id"]),
            })))
        });

        let redirect = session
            .send_redirect_session_data_to_woopay(&json!({ "blog_id": 7 }))
            .await
            .unwrap();

        assert_eq!(
            redirect.redirect_url.as_deref(),
            Some("https://pay.example/?platform_checkout_key=7")
        );
        let posted = host.posted_messages();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].message_type, MessageType::SendRedirectSessionData);
    }

    #[tokio::test]
    async fn test_redirect_session_unexpected_shape() {
        let (_, session) = connect(|_| Some(FrameReply::ok(json!(["not", "an", "object"]))));
        let err = session
            .send_redirect_session_data_to_woopay(&json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::UnexpectedResponse(_)));
    }
}
