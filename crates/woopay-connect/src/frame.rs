//! Frame Host Abstraction
//!
//! The page capability a connect channel needs: create a hidden frame pointed at
//! WooPay, post messages into it, and listen for `message` events coming back.
//! A browser adapter implements this over `iframe` + `postMessage`; the
//! [`InProcessFrameHost`] implements it in memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use url::Url;

use crate::error::{ConnectError, Result};
use crate::lock;
use crate::message::OutboundMessage;

/// A `message` event delivered to the page
#[derive(Clone, Debug, PartialEq)]
pub struct MessageEvent {
    /// Origin of the sender, e.g. `https://pay.woo.com`
    pub origin: String,

    /// Event payload
    pub data: Value,
}

/// Callback invoked for every `message` event
pub type MessageListener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Handle returned by listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A hidden frame owned by one connect channel
pub trait Frame: Send + Sync {
    /// Post a message into the frame's window, restricted to `target_origin`
    fn post_message(&self, message: &OutboundMessage, target_origin: &str) -> Result<()>;

    /// Detach the frame from the page
    fn remove(&self);
}

/// Page capability used to create frames and observe `message` events
pub trait FrameHost: Send + Sync {
    /// Create a hidden frame pointed at `src` and attach it to the page
    fn create_frame(&self, src: &Url) -> Result<Arc<dyn Frame>>;

    /// Register a `message` listener
    fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

    /// Remove a previously registered listener; unknown ids are ignored
    fn remove_message_listener(&self, id: ListenerId);
}

/// Reply produced by an [`InProcessFrameHost`] responder
#[derive(Clone, Debug)]
pub struct FrameReply {
    pub success: bool,
    pub body: Value,
    pub delay: Duration,
}

impl FrameReply {
    pub fn ok(body: Value) -> Self {
        Self {
            success: true,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn failed(body: Value) -> Self {
        Self {
            success: false,
            body,
            delay: Duration::ZERO,
        }
    }

    /// Deliver the reply after `delay`
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Decides how the in-process frame answers a request; `None` means never answer
pub type Responder = Arc<dyn Fn(&OutboundMessage) -> Option<FrameReply> + Send + Sync>;

type ListenerMap = Arc<Mutex<HashMap<ListenerId, MessageListener>>>;

fn dispatch_to(listeners: &ListenerMap, event: &MessageEvent) {
    // Snapshot so listeners may (un)register while being called
    let snapshot: Vec<MessageListener> = lock(listeners).values().cloned().collect();
    for listener in snapshot {
        listener(event);
    }
}

/// In-memory frame host (for development/testing)
///
/// Replies are delivered asynchronously on the tokio runtime, after the delay
/// chosen by the responder, with the host's origin as the event origin.
pub struct InProcessFrameHost {
    origin: String,
    responder: Responder,
    listeners: ListenerMap,
    next_listener_id: AtomicU64,
    frames: Mutex<Vec<Arc<InProcessFrame>>>,
    posted: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl InProcessFrameHost {
    pub fn new(
        origin: impl Into<String>,
        responder: impl Fn(&OutboundMessage) -> Option<FrameReply> + Send + Sync + 'static,
    ) -> Self {
        Self {
            origin: origin.into(),
            responder: Arc::new(responder),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: AtomicU64::new(1),
            frames: Mutex::new(Vec::new()),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Deliver an arbitrary event to every registered listener
    pub fn dispatch(&self, event: &MessageEvent) {
        dispatch_to(&self.listeners, event);
    }

    /// Messages posted into any frame so far
    pub fn posted_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.posted).clone()
    }

    /// Sources of frames that are still attached
    pub fn live_frames(&self) -> Vec<Url> {
        lock(&self.frames)
            .iter()
            .filter(|frame| frame.live.load(Ordering::SeqCst))
            .map(|frame| frame.src.clone())
            .collect()
    }

    /// Number of frames ever created
    pub fn created_frame_count(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl FrameHost for InProcessFrameHost {
    fn create_frame(&self, src: &Url) -> Result<Arc<dyn Frame>> {
        let frame = Arc::new(InProcessFrame {
            src: src.clone(),
            origin: self.origin.clone(),
            responder: Arc::clone(&self.responder),
            listeners: Arc::clone(&self.listeners),
            posted: Arc::clone(&self.posted),
            live: AtomicBool::new(true),
        });
        lock(&self.frames).push(Arc::clone(&frame));
        Ok(frame)
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).insert(id, listener);
        id
    }

    fn remove_message_listener(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id);
    }
}

struct InProcessFrame {
    src: Url,
    origin: String,
    responder: Responder,
    listeners: ListenerMap,
    posted: Arc<Mutex<Vec<OutboundMessage>>>,
    live: AtomicBool,
}

impl Frame for InProcessFrame {
    fn post_message(&self, message: &OutboundMessage, target_origin: &str) -> Result<()> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(ConnectError::Frame(format!("frame {} was removed", self.src)));
        }
        if target_origin != self.origin {
            return Err(ConnectError::Frame(format!(
                "target origin {target_origin} does not match frame origin {}",
                self.origin
            )));
        }

        lock(&self.posted).push(message.clone());

        let Some(reply) = (self.responder)(message) else {
            return Ok(());
        };

        let data = if reply.success {
            json!({ "id": message.id, "success": true, "result": reply.body })
        } else {
            json!({ "id": message.id, "success": false, "error": reply.body })
        };
        let event = MessageEvent {
            origin: self.origin.clone(),
            data,
        };
        let listeners = Arc::clone(&self.listeners);

        tokio::spawn(async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            dispatch_to(&listeners, &event);
        });

        Ok(())
    }

    fn remove(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}
