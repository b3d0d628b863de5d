//! Order submission.
//!
//! A successful checkout records the order, clears the cart, and enters the
//! checkout flow so the session survives until payment completes. The flow
//! ends with [`CheckoutFlow::finish`].

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use secure_store_core::OrderId;

use crate::api::types::{CheckoutItem, CheckoutRequest, ShippingInfo};
use crate::auth::AuthManager;
use crate::cart::CartManager;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::navigation::NavigationContext;
use crate::storage::{TwoTierStorage, keys};

/// Errors from submitting an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    /// The backend answered but refused the order.
    #[error("Checkout failed: {0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A created order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub message: Option<String>,
}

/// Submits the active cart as an order.
#[derive(Debug, Clone)]
pub struct CheckoutFlow {
    gateway: Gateway,
    auth: Arc<AuthManager>,
    cart: Arc<CartManager>,
    navigation: Arc<NavigationContext>,
    storage: TwoTierStorage,
}

impl CheckoutFlow {
    #[must_use]
    pub const fn new(
        gateway: Gateway,
        auth: Arc<AuthManager>,
        cart: Arc<CartManager>,
        navigation: Arc<NavigationContext>,
        storage: TwoTierStorage,
    ) -> Self {
        Self {
            gateway,
            auth,
            cart,
            navigation,
            storage,
        }
    }

    /// Submit the active cart with `shipping`.
    ///
    /// On success the order ID is stored, the cart is cleared, and the
    /// checkout flow is entered. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`] if there is nothing to order
    /// - [`CheckoutError::Rejected`] if the backend refused the order
    /// - [`CheckoutError::Api`] if the request failed
    #[instrument(skip(self, shipping))]
    pub async fn submit(&self, shipping: ShippingInfo) -> Result<CheckoutReceipt, CheckoutError> {
        let snapshot = self.cart.snapshot();
        if snapshot.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let request = CheckoutRequest {
            items: snapshot.cart.items().iter().map(CheckoutItem::from).collect(),
            shipping_info: shipping,
            user_id: self.auth.state().user().map(|user| user.id.clone()),
        };

        let response = self.gateway.checkout(&request).await?;

        let order_id = match response.order_id {
            Some(order_id) if response.success => order_id,
            _ => {
                let reason = response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "Checkout failed".to_string());
                warn!(%reason, "Backend rejected checkout");
                return Err(CheckoutError::Rejected(reason));
            }
        };

        self.storage.write(keys::CURRENT_ORDER, order_id.as_str());
        self.navigation.enter_checkout();
        self.cart.clear();

        info!(order_id = %order_id, items = request.items.len(), "Order created");
        Ok(CheckoutReceipt {
            order_id,
            message: response.message,
        })
    }

    /// The order awaiting payment, if any.
    #[must_use]
    pub fn current_order(&self) -> Option<OrderId> {
        self.storage.read(keys::CURRENT_ORDER).map(OrderId::new)
    }

    /// Payment status of the current order.
    ///
    /// Returns `Ok(None)` if no order is in progress.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn payment_status(&self) -> Result<Option<Value>, ApiError> {
        let Some(order_id) = self.current_order() else {
            return Ok(None);
        };
        self.gateway.payment_status(&order_id).await.map(Some)
    }

    /// Leave the checkout flow and forget the current order.
    pub fn finish(&self) {
        self.navigation.leave_checkout();
        self.storage.delete(keys::CURRENT_ORDER);
        info!("Checkout flow finished");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use parking_lot::Mutex;
    use secure_store_core::{OwnerId, Price, Product, ProductId, UserId};
    use serde_json::json;

    use super::*;
    use crate::testing::Fixture;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "Ann".to_string(),
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
            country: "US".to_string(),
            email: "ann@example.com".to_string(),
        }
    }

    fn flow(fixture: &Fixture) -> CheckoutFlow {
        let cart = Arc::new(CartManager::new(
            OwnerId::User(UserId::new("u1")),
            fixture.storage.clone(),
        ));
        CheckoutFlow::new(
            Gateway::new(fixture.api.clone(), Arc::clone(&fixture.auth)),
            Arc::clone(&fixture.auth),
            cart,
            Arc::clone(&fixture.navigation),
            fixture.storage.clone(),
        )
    }

    fn widget() -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Widget".to_string(),
            price: Price::from_cents(1999).unwrap(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_locally() {
        let fixture = Fixture::offline();
        let result = flow(&fixture).submit(shipping()).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_success_records_order_and_clears_cart() {
        let seen = Arc::new(Mutex::new(None));
        let router = {
            let seen = Arc::clone(&seen);
            Router::new()
                .route(
                    "/monero/checkout",
                    post(move |axum::Json(body): axum::Json<Value>| {
                        let seen = Arc::clone(&seen);
                        async move {
                            *seen.lock() = Some(body);
                            axum::Json(json!({"success": true, "order_id": "o-1"}))
                        }
                    }),
                )
                .route(
                    "/monero/order_payment/o-1",
                    get(|| async { axum::Json(json!({"status": "pending"})) }),
                )
        };
        let fixture = Fixture::serving(router).await;
        let flow = flow(&fixture);
        flow.cart.add_item(widget());
        flow.cart.add_item(widget());

        let receipt = flow.submit(shipping()).await.unwrap();

        assert_eq!(receipt.order_id, OrderId::new("o-1"));
        assert!(flow.cart.items().is_empty());
        assert!(fixture.navigation.in_checkout_flow());
        assert_eq!(flow.current_order(), Some(OrderId::new("o-1")));

        let body = seen.lock().clone().unwrap();
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["shipping_info"]["city"], "Springfield");

        let status = flow.payment_status().await.unwrap().unwrap();
        assert_eq!(status["status"], "pending");

        flow.finish();
        assert!(!fixture.navigation.in_checkout_flow());
        assert!(flow.current_order().is_none());
    }

    #[tokio::test]
    async fn test_rejection_keeps_cart() {
        let router = Router::new().route(
            "/monero/checkout",
            post(|| async { axum::Json(json!({"success": false, "error": "Out of stock"})) }),
        );
        let fixture = Fixture::serving(router).await;
        let flow = flow(&fixture);
        flow.cart.add_item(widget());

        let err = flow.submit(shipping()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Rejected(ref reason) if reason == "Out of stock"));
        assert_eq!(flow.cart.count(), 1);
        assert!(!fixture.navigation.in_checkout_flow());
    }

    #[tokio::test]
    async fn test_backend_error_surfaces() {
        let router = Router::new().route(
            "/monero/checkout",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let fixture = Fixture::serving(router).await;
        let flow = flow(&fixture);
        flow.cart.add_item(widget());

        let err = flow.submit(shipping()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Api(ref e) if e.status() == Some(502)));
        assert_eq!(flow.cart.count(), 1);
    }
}
