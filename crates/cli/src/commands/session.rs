//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! ss-cli login -u alice            # password from STORE_PASSWORD or --password
//! ss-cli whoami
//! ss-cli refresh
//! ss-cli logout
//! ```

use secure_store_client::api::types::Credentials;

use super::{CommandError, load_session, load_state};

/// Log in and persist the session.
///
/// # Errors
///
/// Returns error if the backend rejects the credentials.
pub async fn login(username: &str, password: &str) -> Result<(), CommandError> {
    let state = load_state()?;
    let credentials = Credentials::new(username, password);

    let user = state.sign_in(&credentials).await?;
    tracing::info!(
        "Logged in as {} ({}, role: {})",
        user.username,
        user.id,
        user.role
    );

    let view = state.cart().view();
    if view.count > 0 {
        tracing::info!("Cart: {} item(s), total ${:.2}", view.count, view.total);
    }
    Ok(())
}

/// Register a new account.
///
/// # Errors
///
/// Returns error if the backend rejects the registration.
pub async fn register(username: &str, password: &str) -> Result<(), CommandError> {
    let state = load_state()?;
    let credentials = Credentials::new(username, password);
    state.gateway().register(&credentials).await?;
    tracing::info!("Registered {username}. Log in with `ss-cli login -u {username}`");
    Ok(())
}

/// End the stored session.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub fn logout() -> Result<(), CommandError> {
    let state = load_state()?;
    if state.sign_out() {
        tracing::info!("Logged out");
    } else {
        tracing::warn!("Checkout in progress; session kept. Run `ss-cli checkout finish` first");
    }
    Ok(())
}

/// Show the verified session.
///
/// # Errors
///
/// Returns [`CommandError::NotLoggedIn`] if there is no valid session.
pub async fn whoami() -> Result<(), CommandError> {
    let state = load_session().await?;
    let auth = state.auth().state();
    let user = auth.user().ok_or(CommandError::NotLoggedIn)?;

    tracing::info!(
        "{} ({}) - role: {}{}",
        user.username,
        user.id,
        user.role,
        if auth.is_admin() { " [admin]" } else { "" }
    );
    Ok(())
}

/// Exchange the stored token for a fresh one.
///
/// # Errors
///
/// Returns [`CommandError::NotLoggedIn`] if there is no valid session.
pub async fn refresh() -> Result<(), CommandError> {
    let state = load_session().await?;
    if !state.auth().state().is_authenticated() {
        return Err(CommandError::NotLoggedIn);
    }

    if state.auth().refresh_token().await {
        tracing::info!("Token refreshed");
    } else {
        tracing::warn!("Token refresh failed; keeping the current token");
    }
    Ok(())
}
