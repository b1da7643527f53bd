//! Checkout Page Capability
//!
//! The slice of the storefront page the orchestrator touches: finding the
//! "proceed to checkout" buttons, decorating them while a click is handled, and
//! navigating.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Class of the spinner overlay injected into a button
pub const SPINNER_CLASS: &str = "wc-block-components-spinner";

const PROCEED_TO_CHECKOUT_CLASS: &str = "wc-proceed-to-checkout";
const CHECKOUT_BUTTON_CLASS: &str = "checkout-button";

/// Known "proceed to checkout" buttons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonVariant {
    ClassicCart,
    BlocksCart,
    BlocksMiniCart,
    BlocksMiniCartFooter,
    ClassicMiniCart,
}

impl ButtonVariant {
    pub const ALL: [ButtonVariant; 5] = [
        ButtonVariant::ClassicCart,
        ButtonVariant::BlocksCart,
        ButtonVariant::BlocksMiniCart,
        ButtonVariant::BlocksMiniCartFooter,
        ButtonVariant::ClassicMiniCart,
    ];

    pub fn selector(&self) -> &'static str {
        match self {
            ButtonVariant::ClassicCart => ".wc-proceed-to-checkout .checkout-button",
            ButtonVariant::BlocksCart => ".wp-block-woocommerce-proceed-to-checkout-block",
            ButtonVariant::BlocksMiniCart => "a.wp-block-woocommerce-mini-cart-checkout-button-block",
            ButtonVariant::BlocksMiniCartFooter => "a.wc-block-mini-cart__footer-checkout",
            ButtonVariant::ClassicMiniCart => ".widget_shopping_cart a.checkout",
        }
    }

    fn is_mini_cart(&self) -> bool {
        matches!(
            self,
            ButtonVariant::BlocksMiniCart
                | ButtonVariant::BlocksMiniCartFooter
                | ButtonVariant::ClassicMiniCart
        )
    }
}

/// A DOM element as seen by the orchestrator
pub trait PageElement: Send + Sync {
    fn matches(&self, selector: &str) -> bool;

    fn has_class(&self, class: &str) -> bool;

    fn parent_has_class(&self, class: &str) -> bool;

    /// `href` of the element itself, when it is an anchor
    fn href(&self) -> Option<String>;

    /// `href` of the first anchor nested inside the element
    fn nested_anchor_href(&self) -> Option<String>;

    /// Inject a [`SPINNER_CLASS`] overlay and fade the label
    fn show_loading_overlay(&self);
}

/// Page-level capability
pub trait CheckoutPage: Send + Sync {
    /// All elements matching a CSS selector
    ///
    /// Repeated lookups must return the same `Arc` for the same element.
    fn find_elements(&self, selector: &str) -> Vec<Arc<dyn PageElement>>;

    /// Send the browser to `url`
    fn navigate(&self, url: &str);
}

/// The click being handled
pub trait ClickEvent: Send + Sync {
    fn prevent_default(&self);
}

/// A checkout button wired to the WooPay flow
pub struct CheckoutButton {
    element: Arc<dyn PageElement>,
    variant: ButtonVariant,
    user_is_logged_in: bool,
    is_loading: AtomicBool,
}

impl CheckoutButton {
    pub fn new(element: Arc<dyn PageElement>, variant: ButtonVariant, user_is_logged_in: bool) -> Self {
        Self {
            element,
            variant,
            user_is_logged_in,
            is_loading: AtomicBool::new(false),
        }
    }

    pub fn element(&self) -> &Arc<dyn PageElement> {
        &self.element
    }

    pub fn variant(&self) -> ButtonVariant {
        self.variant
    }

    /// Login state determined when the button was bound
    pub fn user_is_logged_in(&self) -> bool {
        self.user_is_logged_in
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// Claim the button for one click; `false` if a click is already being handled
    pub(crate) fn begin_loading(&self) -> bool {
        self.is_loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn finish_loading(&self) {
        self.is_loading.store(false, Ordering::SeqCst);
    }

    /// Mini-cart buttons and the classic cart button get a spinner
    pub(crate) fn wants_spinner(&self) -> bool {
        let mini_cart = ButtonVariant::ALL
            .iter()
            .filter(|variant| variant.is_mini_cart())
            .any(|variant| self.element.matches(variant.selector()));

        mini_cart
            || (self.element.has_class(CHECKOUT_BUTTON_CLASS)
                && self.element.parent_has_class(PROCEED_TO_CHECKOUT_CLASS))
    }

    /// Where the button would navigate without WooPay
    pub fn target_href(&self) -> Option<String> {
        self.element
            .href()
            .filter(|href| !href.is_empty())
            .or_else(|| self.element.nested_anchor_href())
            .filter(|href| !href.is_empty())
    }
}

impl std::fmt::Debug for CheckoutButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutButton")
            .field("variant", &self.variant)
            .field("user_is_logged_in", &self.user_is_logged_in)
            .field("is_loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory page used by the crate's tests

    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeElement {
        pub selectors: HashSet<String>,
        pub classes: HashSet<String>,
        pub parent_classes: HashSet<String>,
        pub href: Option<String>,
        pub nested_href: Option<String>,
        pub overlays: AtomicUsize,
    }

    impl FakeElement {
        pub fn anchor(selector: &str, href: &str) -> Self {
            Self {
                selectors: HashSet::from([selector.to_string()]),
                href: Some(href.to_string()),
                ..Default::default()
            }
        }

        pub fn overlay_count(&self) -> usize {
            self.overlays.load(Ordering::SeqCst)
        }
    }

    impl PageElement for FakeElement {
        fn matches(&self, selector: &str) -> bool {
            self.selectors.contains(selector)
        }

        fn has_class(&self, class: &str) -> bool {
            self.classes.contains(class)
        }

        fn parent_has_class(&self, class: &str) -> bool {
            self.parent_classes.contains(class)
        }

        fn href(&self) -> Option<String> {
            self.href.clone()
        }

        fn nested_anchor_href(&self) -> Option<String> {
            self.nested_href.clone()
        }

        fn show_loading_overlay(&self) {
            self.overlays.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    pub struct FakePage {
        pub elements: Mutex<Vec<(String, Arc<FakeElement>)>>,
        pub navigations: Mutex<Vec<String>>,
    }

    impl FakePage {
        pub fn add(&self, element: FakeElement) -> Arc<FakeElement> {
            let element = Arc::new(element);
            let mut elements = self.elements.lock().unwrap();
            for selector in &element.selectors {
                elements.push((selector.clone(), Arc::clone(&element)));
            }
            element
        }

        pub fn navigations(&self) -> Vec<String> {
            self.navigations.lock().unwrap().clone()
        }
    }

    impl CheckoutPage for FakePage {
        fn find_elements(&self, selector: &str) -> Vec<Arc<dyn PageElement>> {
            self.elements
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| s == selector)
                .map(|(_, element)| Arc::clone(element) as Arc<dyn PageElement>)
                .collect()
        }

        fn navigate(&self, url: &str) {
            self.navigations.lock().unwrap().push(url.to_string());
        }
    }

    #[derive(Default)]
    pub struct FakeClick {
        pub prevented: AtomicBool,
    }

    impl FakeClick {
        pub fn was_prevented(&self) -> bool {
            self.prevented.load(Ordering::SeqCst)
        }
    }

    impl ClickEvent for FakeClick {
        fn prevent_default(&self) {
            self.prevented.store(true, Ordering::SeqCst);
        }
    }
}
