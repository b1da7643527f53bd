//! # woopay-connect
//!
//! Correlated request/response channels to the hidden WooPay connect frames.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │  UserConnect             │        │  SessionConnect          │
//! │  logged in? account data │        │  reachable? redirect     │
//! └────────────┬─────────────┘        └────────────┬─────────────┘
//!              │                                   │
//!              ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ConnectChannel: { id, type, payload } ──▶ frame            │
//! │                  { id, success, result } ◀── message event  │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               ▼
//!                      FrameHost (iframe / in-process)
//! ```
//!
//! The `FrameHost` trait keeps the channel independent of the page: a browser
//! adapter backs it with `iframe` + `postMessage`, tests use
//! [`InProcessFrameHost`].

pub mod channel;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;
pub mod user;

pub use channel::{ConnectChannel, ConnectKind, PostMessageTimeout};
pub use error::{ConnectError, Result};
pub use frame::{
    Frame, FrameHost, FrameReply, InProcessFrameHost, ListenerId, MessageEvent, MessageListener,
};
pub use message::{InboundMessage, MessageType, OutboundMessage};
pub use session::{RedirectSession, SessionConnect};
pub use user::UserConnect;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
