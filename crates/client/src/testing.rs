//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::api::ApiClient;
use crate::auth::AuthManager;
use crate::config::ApiConfig;
use crate::navigation::NavigationContext;
use crate::storage::{MemoryStorage, TwoTierStorage};

/// Nothing listens on the discard port, so every request fails fast.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Serve `router` on an ephemeral port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn api(base: &str) -> ApiClient {
    let config = ApiConfig::with_base(base.parse().unwrap());
    ApiClient::new(config, Duration::from_secs(5)).unwrap()
}

/// An auth manager over two in-memory namespaces.
pub(crate) struct Fixture {
    pub session: Arc<MemoryStorage>,
    pub durable: Arc<MemoryStorage>,
    pub storage: TwoTierStorage,
    pub navigation: Arc<NavigationContext>,
    pub api: ApiClient,
    pub auth: Arc<AuthManager>,
}

impl Fixture {
    fn build(base: &str) -> Self {
        let (session, durable, storage) = crate::storage::tests::memory_pair();
        let navigation = Arc::new(NavigationContext::new());
        let api = api(base);
        let auth = Arc::new(AuthManager::new(
            storage.clone(),
            api.clone(),
            Arc::clone(&navigation),
        ));
        Self {
            session,
            durable,
            storage,
            navigation,
            api,
            auth,
        }
    }

    /// A fixture whose backend is unreachable.
    pub(crate) fn offline() -> Self {
        Self::build(UNREACHABLE)
    }

    /// A fixture backed by `router`.
    pub(crate) async fn serving(router: Router) -> Self {
        Self::build(&serve(router).await)
    }

    /// A fresh auth manager over the same storage, as after a restart.
    pub(crate) fn reopen(&self) -> Self {
        let navigation = Arc::new(NavigationContext::new());
        let auth = Arc::new(AuthManager::new(
            self.storage.clone(),
            self.api.clone(),
            Arc::clone(&navigation),
        ));
        Self {
            session: Arc::clone(&self.session),
            durable: Arc::clone(&self.durable),
            storage: self.storage.clone(),
            navigation,
            api: self.api.clone(),
            auth,
        }
    }
}
