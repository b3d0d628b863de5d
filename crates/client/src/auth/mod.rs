//! Authentication session state.
//!
//! [`AuthManager`] owns the current [`AuthState`], persists credentials to
//! both storage namespaces, and validates the stored session against the
//! backend profile endpoint.
//!
//! # State machine
//!
//! ```text
//!   Anonymous ──check_auth (stored token)──▶ Authenticating
//!   Authenticating ──profile ok──▶ Authenticated
//!   Authenticating ──profile failed──▶ Anonymous      (kept during checkout)
//!   Authenticated ──logout──▶ Anonymous               (ignored during checkout)
//!   any ──login──▶ Authenticated
//! ```
//!
//! Every login, logout, and session check bumps a generation counter. A
//! profile response that arrives after the generation moved on is discarded,
//! so a slow check can never resurrect a session the user already left.

pub mod token;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use secure_store_core::UserIdentity;

use crate::api::types::{LoginResponse, ProfileResponse, RefreshResponse};
use crate::api::{ApiClient, RequestOptions};
use crate::navigation::NavigationContext;
use crate::observable::{Observable, SubscriptionId};
use crate::storage::{TwoTierStorage, keys};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthPhase {
    /// No session.
    #[default]
    Anonymous,
    /// A stored token is being verified.
    Authenticating,
    /// The backend confirmed the session.
    Authenticated,
}

/// Snapshot of the authentication session.
///
/// Fields are private so the invariants hold by construction: an anonymous
/// state carries neither token nor user, and admin status is always derived
/// from the user's role.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    phase: AuthPhase,
    token: Option<SecretString>,
    user: Option<UserIdentity>,
}

impl AuthState {
    /// The empty session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A stored session awaiting verification, optionally with a cached user.
    #[must_use]
    pub fn authenticating(token: impl Into<String>, cached_user: Option<UserIdentity>) -> Self {
        Self {
            phase: AuthPhase::Authenticating,
            token: Some(SecretString::from(token.into())),
            user: cached_user,
        }
    }

    /// A verified session.
    #[must_use]
    pub fn authenticated(token: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            token: Some(SecretString::from(token.into())),
            user: Some(user),
        }
    }

    /// Lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// Whether a session is present (verified or being verified).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self.phase, AuthPhase::Anonymous)
    }

    /// The bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(ExposeSecret::expose_secret)
    }

    /// The user identity, if known.
    #[must_use]
    pub const fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    /// Whether the current user has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(UserIdentity::is_admin)
    }

    /// The same session with a different token. Anonymous states are
    /// returned unchanged.
    #[must_use]
    fn with_token(&self, token: &str) -> Option<Self> {
        self.is_authenticated().then(|| Self {
            token: Some(SecretString::from(token.to_owned())),
            ..self.clone()
        })
    }
}

/// Owns the authentication session.
///
/// Credentials are written to storage from inside the state mutation that
/// accepts them, so storage and the published snapshot change together.
pub struct AuthManager {
    state: Observable<AuthState>,
    storage: TwoTierStorage,
    api: ApiClient,
    navigation: Arc<NavigationContext>,
    generation: Arc<AtomicU64>,
}

impl AuthManager {
    /// Create a manager, restoring any persisted session.
    ///
    /// A stored token starts the session in [`AuthPhase::Authenticating`]
    /// until [`AuthManager::check_auth`] confirms it.
    #[must_use]
    pub fn new(storage: TwoTierStorage, api: ApiClient, navigation: Arc<NavigationContext>) -> Self {
        let initial = storage.read(keys::AUTH_TOKEN).map_or_else(AuthState::anonymous, |token| {
            let cached = storage.read_json::<UserIdentity>(keys::AUTH_USER);
            debug!(cached_user = cached.is_some(), "Restored stored session");
            AuthState::authenticating(token, cached)
        });

        Self {
            state: Observable::new(initial),
            storage,
            api,
            navigation,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current session snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<AuthState> {
        self.state.get()
    }

    /// Register for session changes.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Arc<AuthState>) + Send + Sync + 'static,
    {
        self.state.subscribe(f)
    }

    /// Remove a session subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    /// Apply a successful login response.
    pub fn login(&self, response: &LoginResponse) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let user = response.identity();
        let token = response.token.clone();
        info!(user_id = %user.id, role = %user.role, "Logged in");

        let storage = self.storage.clone();
        self.state.update(move |_| {
            storage.write(keys::AUTH_TOKEN, &token);
            storage.write_json(keys::AUTH_USER, &user);
            AuthState::authenticated(token, user)
        });
    }

    /// End the session.
    ///
    /// Does nothing while a checkout flow is in progress. Returns whether the
    /// session was cleared.
    pub fn logout(&self) -> bool {
        if self.navigation.in_checkout_flow() {
            info!("Ignoring logout during checkout flow");
            return false;
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        let storage = self.storage.clone();
        self.state.update_if(move |current| {
            clear_credentials(&storage);
            current.is_authenticated().then(AuthState::anonymous)
        });
        info!("Logged out");
        true
    }

    /// Replace the bearer token without touching the user identity.
    pub fn update_token(&self, token: &str) {
        let storage = self.storage.clone();
        let token = token.to_owned();
        let applied = self.state.update_if(move |current| {
            let next = current.with_token(&token)?;
            storage.write(keys::AUTH_TOKEN, &token);
            Some(next)
        });

        if applied {
            debug!("Token updated");
        } else {
            warn!("Ignoring token update without a session");
        }
    }

    /// Verify the stored session against the backend.
    ///
    /// Optimistically restores any cached user, then fetches the profile. On
    /// success the profile overwrites the cached identity. On any failure the
    /// stored credentials are cleared and the session reset, unless a
    /// checkout flow is in progress. Responses that arrive after a newer
    /// login, logout, or check are discarded.
    ///
    /// Returns whether the session was confirmed. Never fails.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> bool {
        let token = self
            .storage
            .read(keys::AUTH_TOKEN)
            .or_else(|| self.state.get().token().map(str::to_owned));
        let Some(token) = token else {
            debug!("No stored token");
            return false;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if token::is_expired(&token, Utc::now()) {
            info!("Stored token has expired");
            self.reject_session(generation);
            return false;
        }

        let cached = self.storage.read_json::<UserIdentity>(keys::AUTH_USER);
        let restored = AuthState::authenticating(token.clone(), cached.clone());
        if !self.apply_if_current(generation, move |_| Some(restored)) {
            return false;
        }

        let result = self
            .api
            .send_json::<ProfileResponse>(
                &self.api.config().profile,
                RequestOptions::get(),
                Some(&token),
            )
            .await;

        match result {
            Ok(profile) => {
                let username = profile
                    .username
                    .or_else(|| {
                        cached
                            .filter(|user| user.id == profile.id)
                            .map(|user| user.username)
                    })
                    .unwrap_or_else(|| profile.id.to_string());
                let user = UserIdentity::new(profile.id, username, profile.role);

                let storage = self.storage.clone();
                self.apply_if_current(generation, move |_| {
                    storage.write_json(keys::AUTH_USER, &user);
                    info!(user_id = %user.id, role = %user.role, "Session verified");
                    Some(AuthState::authenticated(token, user))
                })
            }
            Err(e) => {
                warn!(
                    error = %e,
                    auth_failure = e.is_auth_failure(),
                    "Session check failed"
                );
                self.reject_session(generation);
                false
            }
        }
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Returns whether a new token was applied. Failures leave the session
    /// untouched.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> bool {
        let Some(token) = self.state.get().token().map(str::to_owned) else {
            debug!("No session to refresh");
            return false;
        };

        let generation = self.generation.load(Ordering::SeqCst);
        let endpoint = format!("{}/refresh", self.api.config().auth.trim_end_matches('/'));
        let result = self
            .api
            .send_json::<RefreshResponse>(&endpoint, RequestOptions::post(json!({})), Some(&token))
            .await;

        match result {
            Ok(refreshed) => {
                let storage = self.storage.clone();
                let applied = self.apply_if_current(generation, move |current| {
                    let next = current.with_token(&refreshed.token)?;
                    storage.write(keys::AUTH_TOKEN, &refreshed.token);
                    Some(next)
                });
                if applied {
                    info!("Token refreshed");
                }
                applied
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    /// Refresh the token if it expires within `window`.
    ///
    /// Returns whether a new token was applied.
    pub async fn refresh_if_expiring(&self, window: Duration) -> bool {
        let expiring = self.state.get().token().is_some_and(|token| {
            let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
            token::expires_within(token, Utc::now(), window)
        });

        if expiring {
            self.refresh_token().await
        } else {
            false
        }
    }

    /// Apply `f` only if no login, logout, or newer check happened since
    /// `generation` was taken. The comparison runs under the state lock, so
    /// it cannot interleave with another session change.
    fn apply_if_current<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&AuthState) -> Option<AuthState> + Send + 'static,
    {
        let counter = Arc::clone(&self.generation);
        self.state.update_if(move |current| {
            if counter.load(Ordering::SeqCst) != generation {
                debug!("Discarding stale session update");
                return None;
            }
            f(current)
        })
    }

    /// Clear credentials after a failed check, unless in checkout.
    fn reject_session(&self, generation: u64) {
        let storage = self.storage.clone();
        let navigation = Arc::clone(&self.navigation);
        self.apply_if_current(generation, move |current| {
            if navigation.in_checkout_flow() {
                warn!("Keeping credentials during checkout flow despite failed session check");
                return None;
            }
            clear_credentials(&storage);
            current.is_authenticated().then(AuthState::anonymous)
        });
    }
}

fn clear_credentials(storage: &TwoTierStorage) {
    storage.delete(keys::AUTH_TOKEN);
    storage.delete(keys::AUTH_USER);
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("state", &self.state)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
