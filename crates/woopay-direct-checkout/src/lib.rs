//! # woopay-direct-checkout
//!
//! Sends shoppers straight from the store's cart to WooPay.
//!
//! ## Flow
//!
//! ```text
//! page load ─▶ cookies enabled? ─▶ logged in? ─▶ prefetch session ─▶ bind buttons
//!                     │ no
//!                     └──────────────────────────────────────────▶ bind buttons
//!
//! click ─▶ logged in:  session data ─▶ WooPay redirect_url ─▶ validate ─▶ navigate
//!          otherwise:  reachable? ─▶ minimum session URL ─────────────▶ navigate
//!          any error:  navigate to the button's own href
//! ```
//!
//! The page, the connect frames and the store endpoints sit behind traits
//! ([`CheckoutPage`], [`woopay_connect::FrameHost`], [`SessionBackend`]) so the
//! orchestrator runs the same against a browser adapter or in-memory doubles.

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod page;
pub mod prefetch;
pub mod redirect;
pub mod session_data;

pub use backend::{build_ajax_url, AjaxSessionBackend, SessionBackend};
pub use checkout::{ClickOutcome, WooPayDirectCheckout};
pub use config::DirectCheckoutConfig;
pub use error::{CheckoutError, Result};
pub use page::{ButtonVariant, CheckoutButton, CheckoutPage, ClickEvent, PageElement, SPINNER_CLASS};
pub use prefetch::{PrefetchCache, PrefetchStatus};
pub use redirect::{minimum_session_url, validate_redirect_url, PLATFORM_CHECKOUT_KEY};
pub use session_data::{EncryptedSessionData, SessionPayload};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
