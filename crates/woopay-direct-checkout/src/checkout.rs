//! WooPay Direct Checkout
//!
//! Decides, per shopper, how a "proceed to checkout" click reaches WooPay:
//!
//! - **Logged in** (known at page load): hand the store's encrypted session to
//!   WooPay and follow the redirect URL it returns, after validating it.
//! - **Otherwise**: confirm WooPay is reachable, then redirect with the minimum
//!   session bundle.
//!
//! Any failure on either path falls back to the button's own destination,
//! captured before the async work starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use url::Url;
use woopay_connect::{FrameHost, PostMessageTimeout, SessionConnect, UserConnect};

use crate::backend::SessionBackend;
use crate::config::DirectCheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::lock;
use crate::page::{ButtonVariant, CheckoutButton, CheckoutPage, ClickEvent, PageElement};
use crate::prefetch::PrefetchCache;
use crate::redirect::{minimum_session_url, validate_redirect_url, PLATFORM_CHECKOUT_KEY};
use crate::session_data::EncryptedSessionData;

/// How a click was handled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Another click on the same button is still being handled
    AlreadyHandling,

    /// No destination found; the browser's default navigation proceeds
    DefaultNavigation,

    /// Navigated to WooPay
    RedirectedToWooPay(String),

    /// WooPay flow failed; navigated to the button's own destination
    FellBack { href: String, reason: CheckoutError },
}

/// Direct checkout orchestrator
pub struct WooPayDirectCheckout {
    config: DirectCheckoutConfig,
    woopay_host: Url,
    page: Arc<dyn CheckoutPage>,
    frames: Arc<dyn FrameHost>,
    backend: Arc<dyn SessionBackend>,
    timeout: PostMessageTimeout,
    user_connect: Mutex<Option<Arc<UserConnect>>>,
    session_connect: Mutex<Option<Arc<SessionConnect>>>,
    prefetch: PrefetchCache<EncryptedSessionData>,
    initialized: AtomicBool,
    bound_login_state: Mutex<Option<bool>>,
    bound_buttons: Mutex<Vec<Arc<CheckoutButton>>>,
}

impl WooPayDirectCheckout {
    pub fn new(
        config: DirectCheckoutConfig,
        page: Arc<dyn CheckoutPage>,
        frames: Arc<dyn FrameHost>,
        backend: Arc<dyn SessionBackend>,
    ) -> Result<Self> {
        let woopay_host = config.woopay_host_url()?;
        Ok(Self {
            config,
            woopay_host,
            page,
            frames,
            backend,
            timeout: PostMessageTimeout::new(),
            user_connect: Mutex::new(None),
            session_connect: Mutex::new(None),
            prefetch: PrefetchCache::new(),
            initialized: AtomicBool::new(false),
            bound_login_state: Mutex::new(None),
            bound_buttons: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &DirectCheckoutConfig {
        &self.config
    }

    pub fn is_woopay_enabled(&self) -> bool {
        self.config.is_woopay_enabled
    }

    /// Timeout override shared by both connects
    pub fn post_message_timeout(&self) -> &PostMessageTimeout {
        &self.timeout
    }

    /// Page-load entry point
    ///
    /// Determines the shopper's login state once, prefetches session data for
    /// logged-in shoppers, and binds every checkout button on the page. Returns
    /// the bound buttons; clicks on them go to [`Self::handle_click`].
    pub async fn start(&self) -> Vec<Arc<CheckoutButton>> {
        if !self.is_woopay_enabled() {
            return Vec::new();
        }

        self.init().await;

        let cookies_enabled = match self.is_woopay_third_party_cookies_enabled().await {
            Ok(enabled) => enabled,
            Err(err) => {
                tracing::warn!(error = %err, "Could not check WooPay third-party cookie support");
                false
            }
        };

        if cookies_enabled {
            return match self.is_user_logged_in().await {
                Ok(true) => {
                    self.maybe_prefetch_encrypted_session_data();
                    self.redirect_to_woopay(self.checkout_button_elements(), true)
                }
                Ok(false) => Vec::new(),
                Err(err) => {
                    tracing::warn!(error = %err, "Could not determine WooPay login state");
                    Vec::new()
                }
            };
        }

        // Without third-party cookies the login state cannot be known
        self.redirect_to_woopay(self.checkout_button_elements(), false)
    }

    /// Create the session connect and apply WooPay's post-message timeout once
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = match self.session_connect() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "Could not initialize WooPay session connect");
                return;
            }
        };

        match session.get_post_message_timeout().await {
            Ok(Some(timeout)) => {
                if self.timeout.set(timeout) {
                    tracing::debug!(timeout_ms = %timeout.as_millis(), "Applied WooPay post-message timeout");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(error = %err, "WooPay did not provide a post-message timeout");
            }
        }
    }

    /// Shared user connect, created and attached on first use
    pub fn user_connect(&self) -> Result<Arc<UserConnect>> {
        let mut slot = lock(&self.user_connect);
        if let Some(connect) = slot.as_ref() {
            return Ok(Arc::clone(connect));
        }
        let connect = Arc::new(UserConnect::new(
            Arc::clone(&self.frames),
            &self.woopay_host,
            self.timeout.clone(),
        )?);
        connect.initialize()?;
        *slot = Some(Arc::clone(&connect));
        Ok(connect)
    }

    /// Shared session connect, created and attached on first use
    pub fn session_connect(&self) -> Result<Arc<SessionConnect>> {
        let mut slot = lock(&self.session_connect);
        if let Some(connect) = slot.as_ref() {
            return Ok(Arc::clone(connect));
        }
        let connect = Arc::new(SessionConnect::new(
            Arc::clone(&self.frames),
            &self.woopay_host,
            self.timeout.clone(),
        )?);
        connect.initialize()?;
        *slot = Some(Arc::clone(&connect));
        Ok(connect)
    }

    /// Detach both connects; the next use recreates them
    pub fn teardown(&self) {
        if let Some(user) = lock(&self.user_connect).take() {
            user.detach_message_listener();
        }
        if let Some(session) = lock(&self.session_connect).take() {
            session.detach_message_listener();
        }
    }

    pub async fn is_user_logged_in(&self) -> Result<bool> {
        Ok(self.user_connect()?.is_user_logged_in().await?)
    }

    pub async fn is_woopay_third_party_cookies_enabled(&self) -> Result<bool> {
        Ok(self
            .session_connect()?
            .is_woopay_third_party_cookies_enabled()
            .await?)
    }

    /// Every checkout button currently on the page
    pub fn checkout_button_elements(&self) -> Vec<(ButtonVariant, Arc<dyn PageElement>)> {
        ButtonVariant::ALL
            .iter()
            .flat_map(|variant| {
                self.page
                    .find_elements(variant.selector())
                    .into_iter()
                    .map(move |element| (*variant, element))
            })
            .collect()
    }

    /// Bind buttons to the WooPay flow, skipping elements already bound
    pub fn redirect_to_woopay(
        &self,
        elements: Vec<(ButtonVariant, Arc<dyn PageElement>)>,
        user_is_logged_in: bool,
    ) -> Vec<Arc<CheckoutButton>> {
        *lock(&self.bound_login_state) = Some(user_is_logged_in);

        let mut bound = lock(&self.bound_buttons);
        let mut added = Vec::new();
        for (variant, element) in elements {
            if bound.iter().any(|button| Arc::ptr_eq(button.element(), &element)) {
                continue;
            }
            let button = Arc::new(CheckoutButton::new(element, variant, user_is_logged_in));
            bound.push(Arc::clone(&button));
            added.push(button);
        }

        tracing::debug!(count = added.len(), user_is_logged_in, "Bound checkout buttons");
        added
    }

    /// Buttons bound so far
    pub fn bound_buttons(&self) -> Vec<Arc<CheckoutButton>> {
        lock(&self.bound_buttons).clone()
    }

    /// Cart contents changed: drop stale session data and bind newly rendered buttons
    pub fn on_cart_updated(&self) -> Vec<Arc<CheckoutButton>> {
        self.set_encrypted_session_data_as_not_prefetched();

        let Some(user_is_logged_in) = *lock(&self.bound_login_state) else {
            return Vec::new();
        };
        if user_is_logged_in {
            self.maybe_prefetch_encrypted_session_data();
        }
        self.redirect_to_woopay(self.checkout_button_elements(), user_is_logged_in)
    }

    /// Start fetching session data ahead of the click, except on product pages
    pub fn maybe_prefetch_encrypted_session_data(&self) {
        if self.config.is_product_page {
            return;
        }
        match self.encrypted_session_data_fetch() {
            Ok(fetch) => {
                if self.prefetch.start(fetch) {
                    tracing::debug!("Prefetching WooPay session data");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Could not prefetch WooPay session data"),
        }
    }

    pub fn is_encrypted_session_data_prefetched(&self) -> bool {
        self.prefetch.is_prefetched()
    }

    pub fn set_encrypted_session_data_as_not_prefetched(&self) {
        self.prefetch.invalidate();
    }

    /// Fetch a fresh session bundle from the store
    pub async fn get_encrypted_session_data(&self) -> Result<EncryptedSessionData> {
        self.encrypted_session_data_fetch()?.await
    }

    /// The prefetched bundle if there is one, otherwise a fresh fetch
    pub async fn resolve_encrypted_session_data(&self) -> Result<EncryptedSessionData> {
        self.prefetch
            .read_or_fetch(self.get_encrypted_session_data())
            .await
    }

    fn encrypted_session_data_fetch(&self) -> Result<BoxFuture<'static, Result<EncryptedSessionData>>> {
        let user = self.user_connect()?;
        let backend = Arc::clone(&self.backend);

        Ok(async move {
            let encrypted_data = user.get_encrypted_data().await?;
            backend.get_woopay_session(encrypted_data.as_ref()).await
        }
        .boxed())
    }

    /// Minimum-session redirect URL, preferring data embedded in the page
    pub async fn get_woopay_minimum_session_url(&self) -> Result<Option<String>> {
        let data = match &self.config.minimum_session_data {
            Some(data) => data.clone(),
            None => self.backend.get_woopay_minimum_session_data().await?,
        };
        Ok(minimum_session_url(&self.woopay_host, &data))
    }

    /// Check a WooPay-supplied redirect URL against the configured host
    pub fn validate_redirect_url(&self, redirect_url: &str, required_param: &str) -> bool {
        validate_redirect_url(redirect_url, &self.config.woopay_host, required_param)
    }

    /// Handle a click on a bound button
    ///
    /// Never fails: every error ends in navigation to the button's own
    /// destination.
    pub async fn handle_click(&self, button: &CheckoutButton, event: &dyn ClickEvent) -> ClickOutcome {
        if !button.begin_loading() {
            event.prevent_default();
            return ClickOutcome::AlreadyHandling;
        }

        if button.wants_spinner() {
            button.element().show_loading_overlay();
        }

        // Captured before any async work so later DOM changes cannot lose it
        let Some(fallback_href) = button.target_href() else {
            self.teardown();
            button.finish_loading();
            return ClickOutcome::DefaultNavigation;
        };

        event.prevent_default();

        match self.resolve_redirect_url(button.user_is_logged_in()).await {
            Ok(redirect_url) => {
                self.teardown();
                self.page.navigate(&redirect_url);
                ClickOutcome::RedirectedToWooPay(redirect_url)
            }
            Err(reason) => {
                tracing::warn!(
                    error = %reason,
                    fallback = %fallback_href,
                    "WooPay direct checkout failed, continuing to regular checkout"
                );
                self.teardown();
                self.page.navigate(&fallback_href);
                ClickOutcome::FellBack {
                    href: fallback_href,
                    reason,
                }
            }
        }
    }

    async fn resolve_redirect_url(&self, user_is_logged_in: bool) -> Result<String> {
        if user_is_logged_in {
            self.logged_in_redirect_url().await
        } else {
            self.minimum_session_redirect_url().await
        }
    }

    async fn logged_in_redirect_url(&self) -> Result<String> {
        let session_data = self.resolve_encrypted_session_data().await?;
        if !session_data.is_valid() {
            return Err(CheckoutError::InvalidSessionData);
        }

        let redirect = self
            .session_connect()?
            .send_redirect_session_data_to_woopay(&session_data)
            .await?;
        let redirect_url = redirect
            .redirect_url
            .filter(|url| !url.is_empty())
            .ok_or(CheckoutError::MissingRedirectUrl)?;

        if !self.validate_redirect_url(&redirect_url, PLATFORM_CHECKOUT_KEY) {
            return Err(CheckoutError::InvalidRedirectUrl(redirect_url));
        }
        Ok(redirect_url)
    }

    // Built locally from store data, so it skips the origin check applied to
    // WooPay-supplied URLs
    async fn minimum_session_redirect_url(&self) -> Result<String> {
        if !self.session_connect()?.is_woopay_reachable().await? {
            return Err(CheckoutError::WooPayUnreachable);
        }
        self.get_woopay_minimum_session_url()
            .await?
            .ok_or(CheckoutError::MissingRedirectUrl)
    }
}
