//! Integration tests for Secure Store.
//!
//! Provides [`FakeBackend`], an in-process axum server implementing the
//! backend routes the client uses, and helpers to build [`ClientState`]
//! against it with file-backed durable storage.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p secure-store-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use secure_store_client::ClientState;
use secure_store_client::config::ClientConfig;
use secure_store_client::storage::{FileStorage, MemoryStorage};
use secure_store_core::{Role, UserId};

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
    role: Role,
}

/// Pauses profile responses until released.
#[derive(Debug, Default)]
pub struct ProfileGate {
    entered: Notify,
    release: Notify,
}

impl ProfileGate {
    /// Wait until a profile request is being held.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held profile request answer.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct BackendState {
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, UserId>>,
    products: Mutex<Vec<Value>>,
    orders: Mutex<Vec<Value>>,
    profile_gate: Mutex<Option<Arc<ProfileGate>>>,
    profile_calls: AtomicUsize,
}

impl BackendState {
    fn issue_token(&self, id: &UserId) -> String {
        let token = format!("tok-{}", uuid::Uuid::new_v4().simple());
        self.tokens.lock().insert(token.clone(), id.clone());
        token
    }

    fn account_for(&self, id: &UserId) -> Option<(String, Account)> {
        self.accounts
            .lock()
            .iter()
            .find(|(_, account)| &account.id == id)
            .map(|(name, account)| (name.clone(), account.clone()))
    }

    fn bearer(&self, headers: &HeaderMap) -> Option<UserId> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.tokens.lock().get(token).cloned()
    }
}

type Shared = Arc<BackendState>;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Invalid or expired token"})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

async fn health() -> &'static str {
    "OK"
}

async fn login(State(state): State<Shared>, Json(body): Json<CredentialsBody>) -> Response {
    let account = state.accounts.lock().get(&body.username).cloned();
    match account {
        Some(account) if account.password == body.password => {
            let token = state.issue_token(&account.id);
            Json(json!({
                "token": token,
                "id": account.id,
                "username": body.username,
                "role": account.role.to_string(),
            }))
            .into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid credentials"})),
        )
            .into_response(),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<CredentialsBody>) -> Response {
    let mut accounts = state.accounts.lock();
    if accounts.contains_key(&body.username) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "Username already exists"})),
        )
            .into_response();
    }
    let id = UserId::new(format!("user-{}", accounts.len() + 1));
    accounts.insert(
        body.username,
        Account {
            id,
            password: body.password,
            role: Role::User,
        },
    );
    (
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    )
        .into_response()
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);

    let gate = state.profile_gate.lock().clone();
    if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
    }

    let Some(id) = state.bearer(&headers) else {
        return unauthorized();
    };
    let Some((username, account)) = state.account_for(&id) else {
        return unauthorized();
    };
    Json(json!({"id": id, "username": username, "role": account.role.to_string()})).into_response()
}

async fn refresh(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let Some(id) = state.bearer(&headers) else {
        return unauthorized();
    };
    Json(json!({"token": state.issue_token(&id)})).into_response()
}

async fn products(State(state): State<Shared>) -> Json<Vec<Value>> {
    Json(state.products.lock().clone())
}

async fn checkout(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if state.bearer(&headers).is_none() && headers.contains_key("authorization") {
        return unauthorized();
    }
    if body["items"].as_array().is_none_or(Vec::is_empty) {
        return Json(json!({"success": false, "error": "Cart is empty"})).into_response();
    }

    let mut orders = state.orders.lock();
    let order_id = format!("order-{}", orders.len() + 1);
    orders.push(json!({"order_id": order_id, "request": body}));
    Json(json!({
        "success": true,
        "order_id": order_id,
        "message": "Order created. Awaiting payment.",
    }))
    .into_response()
}

async fn order_payment(State(state): State<Shared>, UrlPath(id): UrlPath<String>) -> Response {
    let exists = state
        .orders
        .lock()
        .iter()
        .any(|order| order["order_id"] == id.as_str());
    if exists {
        Json(json!({"order_id": id, "status": "pending", "amount_xmr": "0.1"})).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "Order not found"}))).into_response()
    }
}

async fn my_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let Some(id) = state.bearer(&headers) else {
        return unauthorized();
    };
    let orders: Vec<Value> = state
        .orders
        .lock()
        .iter()
        .filter(|order| order["request"]["user_id"] == id.as_str())
        .cloned()
        .collect();
    Json(orders).into_response()
}

/// In-process stand-in for the storefront backend.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    base_url: String,
    state: Shared,
}

impl FakeBackend {
    /// Start the server on an ephemeral port with a small catalog.
    pub async fn start() -> Self {
        let state = Shared::default();
        state.products.lock().extend([
            json!({"id": "p1", "name": "Widget", "price": 10.0, "available": true}),
            json!({"id": "p2", "name": "Gadget", "price": 5.0, "available": true}),
            json!({"id": "p3", "name": "Retired", "price": 1.0, "available": false}),
        ]);

        let router = Router::new()
            .route("/health", get(health))
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/profile", get(profile))
            .route("/auth/refresh", post(refresh))
            .route("/products", get(products))
            .route("/monero/checkout", post(checkout))
            .route("/monero/order_payment/{id}", get(order_payment))
            .route("/orders/my-orders", get(my_orders))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create an account.
    pub fn add_user(&self, username: &str, password: &str, role: Role) -> UserId {
        let id = UserId::new(format!("id-{username}"));
        self.state.accounts.lock().insert(
            username.to_string(),
            Account {
                id: id.clone(),
                password: password.to_string(),
                role,
            },
        );
        id
    }

    /// Invalidate every issued token.
    pub fn revoke_all_tokens(&self) {
        self.state.tokens.lock().clear();
    }

    /// Hold profile responses until the returned gate is released.
    #[must_use]
    pub fn hold_profile(&self) -> Arc<ProfileGate> {
        let gate = Arc::new(ProfileGate::default());
        *self.state.profile_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Number of profile requests served.
    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.state.profile_calls.load(Ordering::SeqCst)
    }

    /// Orders received so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.state.orders.lock().clone()
    }

    /// Client configuration pointing at this backend.
    #[must_use]
    pub fn config(&self, data_dir: &Path) -> ClientConfig {
        ClientConfig::with_base_url(&self.base_url, data_dir).unwrap()
    }

    /// A client whose durable namespace lives in `data_dir`.
    ///
    /// Each call starts with an empty session namespace, as after a restart.
    #[must_use]
    pub fn client(&self, data_dir: &Path) -> ClientState {
        let config = self.config(data_dir);
        let session = Arc::new(MemoryStorage::new(config.storage.session_timeout));
        let durable = Arc::new(FileStorage::open(data_dir).unwrap());
        ClientState::from_parts(config, session, durable).unwrap()
    }
}
