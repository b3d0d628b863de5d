//! Authenticated request gateway.
//!
//! [`Gateway::request`] attaches the current session's bearer token and
//! turns any 401 into a forced logout plus [`ApiError::SessionExpired`]. The
//! typed helpers cover the backend routes the client uses.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use secure_store_core::{OrderId, Product};

use crate::api::types::{
    CatalogProduct, CheckoutRequest, CheckoutResponse, Credentials, LoginResponse,
};
use crate::api::{ApiClient, RequestOptions, ResponseBody};
use crate::auth::AuthManager;
use crate::error::ApiError;

const UNAUTHORIZED: u16 = 401;

/// Sends requests on behalf of the current session.
#[derive(Debug, Clone)]
pub struct Gateway {
    api: ApiClient,
    auth: Arc<AuthManager>,
}

impl Gateway {
    #[must_use]
    pub const fn new(api: ApiClient, auth: Arc<AuthManager>) -> Self {
        Self { api, auth }
    }

    /// The underlying HTTP client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Send a request with the session's credentials.
    ///
    /// # Errors
    ///
    /// - [`ApiError::SessionExpired`] on 401, after logging the session out.
    ///   The logout is skipped if the session changed while the request was
    ///   in flight, or if a checkout flow is in progress.
    /// - Any other [`ApiError`] from [`ApiClient::send`].
    #[instrument(skip(self, options))]
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, ApiError> {
        let token = self.auth.state().token().map(str::to_owned);

        match self.api.send(endpoint, options, token.as_deref()).await {
            Err(ApiError::Status { status, message }) if status == UNAUTHORIZED => {
                let current = self.auth.state().token().map(str::to_owned);
                if current == token {
                    warn!(%message, "Backend rejected the session, logging out");
                    self.auth.logout();
                } else {
                    warn!(%message, "Rejected credentials were already replaced");
                }
                Err(ApiError::SessionExpired)
            }
            other => other,
        }
    }

    /// Send a request and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`Gateway::request`]; also [`ApiError::Decode`] on a shape mismatch.
    pub async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(endpoint, options).await?.into_json()
    }

    /// `GET <health>`.
    ///
    /// Healthy means a plain-text `OK`, a JSON `true`, or any other non-null
    /// JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or answers non-2xx.
    pub async fn health(&self) -> Result<bool, ApiError> {
        let body = self
            .api
            .send(&self.api.config().health, RequestOptions::get(), None)
            .await?;
        Ok(match body {
            ResponseBody::Text(text) => text.trim().eq_ignore_ascii_case("ok"),
            ResponseBody::Json(Value::Bool(healthy)) => healthy,
            ResponseBody::Json(value) => !value.is_null(),
            ResponseBody::Empty => true,
        })
    }

    /// `POST <auth>/login`.
    ///
    /// Sent without credentials, so a 401 here means bad credentials rather
    /// than an expired session. The response is not applied to the session;
    /// see [`crate::ClientState::sign_in`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] if the backend rejects the credentials.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let endpoint = self.auth_route("login");
        self.api
            .send_json(&endpoint, RequestOptions::post(credentials.to_body()), None)
            .await
    }

    /// `POST <auth>/register`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] if the backend rejects the registration.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn register(&self, credentials: &Credentials) -> Result<ResponseBody, ApiError> {
        let endpoint = self.auth_route("register");
        let body = self
            .api
            .send(&endpoint, RequestOptions::post(credentials.to_body()), None)
            .await?;
        info!("Registered account");
        Ok(body)
    }

    /// `GET <products>`, keeping only products that can be bought.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the list cannot be decoded.
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let catalog: Vec<CatalogProduct> = self
            .request_json(&self.api.config().products, RequestOptions::get())
            .await?;
        Ok(catalog
            .into_iter()
            .filter(|product| product.available)
            .map(Product::from)
            .collect())
    }

    /// `POST <checkout>`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails. A decoded response with
    /// `success: false` is returned as `Ok`.
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutResponse, ApiError> {
        let body = serde_json::to_value(request)?;
        self.request_json(&self.api.config().checkout, RequestOptions::post(body))
            .await
    }

    /// `GET <monero>/order_payment/<order_id>`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn payment_status(&self, order_id: &OrderId) -> Result<Value, ApiError> {
        let endpoint = format!(
            "{}/order_payment/{order_id}",
            self.api.config().monero.trim_end_matches('/')
        );
        self.request_json(&endpoint, RequestOptions::get()).await
    }

    /// `GET <orders>/my-orders`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn my_orders(&self) -> Result<Vec<Value>, ApiError> {
        let endpoint = format!(
            "{}/my-orders",
            self.api.config().orders.trim_end_matches('/')
        );
        self.request_json(&endpoint, RequestOptions::get()).await
    }

    fn auth_route(&self, route: &str) -> String {
        format!("{}/{route}", self.api.config().auth.trim_end_matches('/'))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use secure_store_core::Role;
    use serde_json::json;

    use super::*;
    use crate::auth::AuthPhase;
    use crate::storage::keys;
    use crate::testing::Fixture;

    fn sign_in(fixture: &Fixture) {
        let response: LoginResponse = serde_json::from_value(json!({
            "token": "tok",
            "id": "u1",
            "username": "ann",
            "role": Role::User.to_string(),
        }))
        .unwrap();
        fixture.auth.login(&response);
    }

    fn gateway(fixture: &Fixture) -> Gateway {
        Gateway::new(fixture.api.clone(), Arc::clone(&fixture.auth))
    }

    #[tokio::test]
    async fn test_401_forces_logout_on_any_endpoint() {
        let router = Router::new().route(
            "/orders/my-orders",
            get(|| async { (StatusCode::UNAUTHORIZED, "expired") }),
        );
        let fixture = Fixture::serving(router).await;
        sign_in(&fixture);

        let result = gateway(&fixture).my_orders().await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(fixture.auth.state().phase(), AuthPhase::Anonymous);
        assert!(fixture.storage.read(keys::AUTH_TOKEN).is_none());
    }

    #[tokio::test]
    async fn test_401_during_checkout_keeps_session() {
        let router = Router::new().route(
            "/orders/my-orders",
            get(|| async { StatusCode::UNAUTHORIZED }),
        );
        let fixture = Fixture::serving(router).await;
        sign_in(&fixture);
        fixture.navigation.enter_checkout();

        let result = gateway(&fixture).my_orders().await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(fixture.auth.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_other_errors_leave_session_alone() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({"error": "database down"})),
                )
            }),
        );
        let fixture = Fixture::serving(router).await;
        sign_in(&fixture);

        let err = gateway(&fixture).products().await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("database down"));
        assert!(fixture.auth.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_health_accepts_text_and_json() {
        let router = Router::new()
            .route("/health", get(|| async { "OK" }))
            .route("/alt-health", get(|| async { axum::Json(json!(false)) }));
        let fixture = Fixture::serving(router).await;
        assert!(gateway(&fixture).health().await.unwrap());

        let mut config = fixture.api.config().clone();
        config.health = "/alt-health".to_string();
        let api = ApiClient::new(config, std::time::Duration::from_secs(5)).unwrap();
        let alt = Gateway::new(api, Arc::clone(&fixture.auth));
        assert!(!alt.health().await.unwrap());
    }

    #[tokio::test]
    async fn test_products_skip_unavailable() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                axum::Json(json!([
                    {"id": "p1", "name": "Widget", "price": 19.99},
                    {"id": "p2", "name": "Gone", "price": 5, "available": false},
                ]))
            }),
        );
        let fixture = Fixture::serving(router).await;

        let products = gateway(&fixture).products().await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let router = Router::new().route(
            "/orders/my-orders",
            get(|headers: axum::http::HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                axum::Json(json!([{"authorization": auth}]))
            }),
        );
        let fixture = Fixture::serving(router).await;
        sign_in(&fixture);

        let orders = gateway(&fixture).my_orders().await.unwrap();

        assert_eq!(orders[0]["authorization"], "Bearer tok");
    }
}
