//! Connect Channel
//!
//! Correlated request/response RPC over one hidden frame. Every request gets a
//! fresh correlation id; the frame's reply is matched back by id, and a request
//! that is never answered fails after its timeout without disturbing others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

use crate::error::{ConnectError, Result};
use crate::frame::{Frame, FrameHost, ListenerId, MessageEvent, MessageListener};
use crate::lock;
use crate::message::{InboundMessage, MessageType, OutboundMessage};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;

/// Which connect frame a channel talks to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectKind {
    User,
    Session,
}

impl ConnectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectKind::User => "user",
            ConnectKind::Session => "session",
        }
    }
}

impl std::fmt::Display for ConnectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set-once override for every post-message timeout
///
/// Clones share the same slot, so one value set by the session frame applies to
/// all channels handed the same handle.
#[derive(Clone, Debug, Default)]
pub struct PostMessageTimeout(Arc<OnceLock<Duration>>);

impl PostMessageTimeout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the override; returns `false` if one was already applied
    pub fn set(&self, timeout: Duration) -> bool {
        self.0.set(timeout).is_ok()
    }

    pub fn get(&self) -> Option<Duration> {
        self.0.get().copied()
    }

    /// The override if applied, otherwise the call site's default
    pub fn resolve(&self, default: Duration) -> Duration {
        self.get().unwrap_or(default)
    }
}

struct Attachment {
    frame: Arc<dyn Frame>,
    listener: ListenerId,
}

/// RPC link to one hidden WooPay frame
pub struct ConnectChannel {
    kind: ConnectKind,
    host: Arc<dyn FrameHost>,
    origin: String,
    src: Url,
    timeout: PostMessageTimeout,
    pending: PendingMap,
    attachment: Mutex<Option<Attachment>>,
}

impl ConnectChannel {
    /// Create a channel; the frame itself is created lazily
    pub fn new(
        kind: ConnectKind,
        host: Arc<dyn FrameHost>,
        woopay_host: &Url,
        timeout: PostMessageTimeout,
    ) -> Result<Self> {
        let mut src = woopay_host
            .join("connect/")
            .map_err(|e| ConnectError::Frame(format!("invalid WooPay host {woopay_host}: {e}")))?;
        src.query_pairs_mut().append_pair("source", kind.as_str());

        Ok(Self {
            kind,
            host,
            origin: woopay_host.origin().ascii_serialization(),
            src,
            timeout,
            pending: Arc::new(Mutex::new(HashMap::new())),
            attachment: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> ConnectKind {
        self.kind
    }

    /// Origin every message is posted to and accepted from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn timeout(&self) -> &PostMessageTimeout {
        &self.timeout
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.attachment).is_some()
    }

    /// Requests still waiting for a response or a timeout
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Create the frame and attach the message listener; no-op when already attached
    pub fn initialize(&self) -> Result<()> {
        self.attached_frame().map(|_| ())
    }

    fn attached_frame(&self) -> Result<Arc<dyn Frame>> {
        let mut attachment = lock(&self.attachment);
        if let Some(existing) = attachment.as_ref() {
            return Ok(Arc::clone(&existing.frame));
        }

        let frame = self.host.create_frame(&self.src)?;
        let listener = self.host.add_message_listener(self.message_listener());

        tracing::debug!(connect = %self.kind, src = %self.src, "Attached connect frame");

        *attachment = Some(Attachment {
            frame: Arc::clone(&frame),
            listener,
        });
        Ok(frame)
    }

    fn message_listener(&self) -> MessageListener {
        let pending = Arc::clone(&self.pending);
        let origin = self.origin.clone();
        let kind = self.kind;

        Arc::new(move |event: &MessageEvent| {
            if event.origin != origin {
                return;
            }
            let Some(response) = InboundMessage::parse(&event.data) else {
                tracing::trace!(connect = %kind, "Ignoring malformed frame message");
                return;
            };

            let waiting = lock(&pending).remove(&response.id);
            match waiting {
                Some(tx) => {
                    // The receiver may already be gone if the caller stopped waiting
                    let _ = tx.send(response.into_result());
                }
                None => {
                    tracing::trace!(
                        connect = %kind,
                        correlation_id = %response.id,
                        "Ignoring response with unknown correlation id"
                    );
                }
            }
        })
    }

    /// Send a request and wait for its correlated response
    ///
    /// `default_timeout` applies unless the shared override has been set.
    /// Initializes the channel on first use.
    pub async fn send_message(
        &self,
        message_type: MessageType,
        payload: Value,
        default_timeout: Duration,
    ) -> Result<Value> {
        let frame = self.attached_frame()?;
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);

        let message = OutboundMessage::new(id.clone(), message_type, payload);
        if let Err(err) = frame.post_message(&message, &self.origin) {
            lock(&self.pending).remove(&id);
            return Err(err);
        }

        let timeout = self.timeout.resolve(default_timeout);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ConnectError::Closed),
            Err(_) => {
                lock(&self.pending).remove(&id);
                tracing::debug!(
                    connect = %self.kind,
                    message_type = %message_type,
                    correlation_id = %id,
                    "Frame request timed out"
                );
                Err(ConnectError::Timeout {
                    message_type: message_type.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Stop receiving frame messages and drop the frame
    ///
    /// Requests already in flight are left to their own timeouts.
    pub fn detach_message_listener(&self) {
        if let Some(attachment) = lock(&self.attachment).take() {
            self.host.remove_message_listener(attachment.listener);
            attachment.frame.remove();
            tracing::debug!(connect = %self.kind, "Detached connect frame");
        }
    }
}
