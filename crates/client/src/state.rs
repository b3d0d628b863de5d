//! Client state container.

use std::sync::Arc;

use tracing::info;

use secure_store_core::UserIdentity;

use crate::api::ApiClient;
use crate::api::types::Credentials;
use crate::auth::AuthManager;
use crate::cart::CartManager;
use crate::checkout::CheckoutFlow;
use crate::config::ClientConfig;
use crate::error::{ApiError, ClientError};
use crate::gateway::Gateway;
use crate::navigation::NavigationContext;
use crate::reconcile::{self, Reconciler};
use crate::storage::{FileStorage, MemoryStorage, Storage, TwoTierStorage, keys};

/// Shared client state.
///
/// Cheaply cloneable via `Arc`. Wires the auth session, the active cart, the
/// reconciler that binds them, and the request gateway over one pair of
/// storage namespaces.
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    config: ClientConfig,
    storage: TwoTierStorage,
    navigation: Arc<NavigationContext>,
    auth: Arc<AuthManager>,
    cart: Arc<CartManager>,
    gateway: Gateway,
    checkout: CheckoutFlow,
}

impl ClientState {
    /// Create state backed by an in-memory session namespace and a file
    /// durable namespace under `config.storage.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created or the HTTP
    /// client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let session = Arc::new(MemoryStorage::new(config.storage.session_timeout));
        let durable = Arc::new(FileStorage::open(&config.storage.data_dir)?);
        Self::from_parts(config, session, durable)
    }

    /// Create state over explicit storage backends.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn from_parts(
        config: ClientConfig,
        session: Arc<dyn Storage>,
        durable: Arc<dyn Storage>,
    ) -> Result<Self, ClientError> {
        let storage = TwoTierStorage::new(session, durable);
        let api = ApiClient::new(config.api.clone(), config.request_timeout)?;
        let navigation = Arc::new(NavigationContext::new());
        if storage.read(keys::CURRENT_ORDER).is_some() {
            // An order is still awaiting payment.
            navigation.enter_checkout();
        }

        let auth = Arc::new(AuthManager::new(
            storage.clone(),
            api.clone(),
            Arc::clone(&navigation),
        ));

        let owner = reconcile::initial_owner(&storage, &auth.state());
        let cart = Arc::new(CartManager::new(owner, storage.clone()));

        let reconciler = Arc::new(Reconciler::new(Arc::clone(&cart), storage.clone()));
        Reconciler::attach(&reconciler, &auth);

        let gateway = Gateway::new(api, Arc::clone(&auth));
        let checkout = CheckoutFlow::new(
            gateway.clone(),
            Arc::clone(&auth),
            Arc::clone(&cart),
            Arc::clone(&navigation),
            storage.clone(),
        );

        info!(
            base = %config.api.base,
            session = auth.state().is_authenticated(),
            "Client state initialized"
        );

        Ok(Self {
            inner: Arc::new(ClientStateInner {
                config,
                storage,
                navigation,
                auth,
                cart,
                gateway,
                checkout,
            }),
        })
    }

    /// Verify any stored session and refresh its token if it is about to
    /// expire. Returns whether a session is active afterwards.
    pub async fn bootstrap(&self) -> bool {
        if !self.auth().check_auth().await {
            return false;
        }
        self.auth()
            .refresh_if_expiring(self.config().token_refresh_window)
            .await;
        true
    }

    /// Log in and apply the session.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the credentials.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, ApiError> {
        let response = self.gateway().login(credentials).await?;
        self.auth().login(&response);
        Ok(response.identity())
    }

    /// End the session. Returns `false` if a checkout flow kept it alive.
    pub fn sign_out(&self) -> bool {
        self.auth().logout()
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &TwoTierStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn navigation(&self) -> &Arc<NavigationContext> {
        &self.inner.navigation
    }

    #[must_use]
    pub fn auth(&self) -> &AuthManager {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutFlow {
        &self.inner.checkout
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("auth", &self.inner.auth)
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}
