//! Navigation context shared with the UI layer.
//!
//! While the user is inside a checkout flow, logout requests and failed
//! session checks must not clear credentials: destroying the session
//! mid-payment would strand the order. The UI marks the flow explicitly with
//! [`NavigationContext::enter_checkout`] / [`NavigationContext::leave_checkout`]
//! or a scoped [`CheckoutGuard`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Where the user currently is, as far as session handling cares.
#[derive(Debug, Default)]
pub struct NavigationContext {
    in_checkout: AtomicBool,
}

impl NavigationContext {
    /// A context outside any checkout flow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a checkout flow is in progress.
    #[must_use]
    pub fn in_checkout_flow(&self) -> bool {
        self.in_checkout.load(Ordering::SeqCst)
    }

    /// Mark the start of a checkout flow.
    pub fn enter_checkout(&self) {
        if !self.in_checkout.swap(true, Ordering::SeqCst) {
            debug!("Entered checkout flow");
        }
    }

    /// Mark the end of a checkout flow.
    pub fn leave_checkout(&self) {
        if self.in_checkout.swap(false, Ordering::SeqCst) {
            debug!("Left checkout flow");
        }
    }

    /// Enter the checkout flow until the returned guard is dropped.
    #[must_use]
    pub fn checkout_guard(self: &Arc<Self>) -> CheckoutGuard {
        self.enter_checkout();
        CheckoutGuard {
            context: Arc::clone(self),
        }
    }
}

/// Keeps the checkout flow active for its lifetime.
#[derive(Debug)]
pub struct CheckoutGuard {
    context: Arc<NavigationContext>,
}

impl Drop for CheckoutGuard {
    fn drop(&mut self) {
        self.context.leave_checkout();
    }
}
