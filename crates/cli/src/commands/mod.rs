//! Command implementations.
//!
//! Every command loads configuration from the environment (and `.env`),
//! builds a [`ClientState`] over the configured data directory, and restores
//! the stored session before acting.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod session;

use secure_store_client::config::ConfigError;
use secure_store_client::{ApiError, CheckoutError, ClientConfig, ClientError, ClientState};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Client state could not be created.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Order submission failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The command needs a session.
    #[error("Not logged in")]
    NotLoggedIn,
}

/// Build client state from the environment.
///
/// # Errors
///
/// Returns error if configuration is invalid or storage cannot be opened.
pub fn load_state() -> Result<ClientState, CommandError> {
    let config = ClientConfig::from_env()?;
    Ok(ClientState::new(config)?)
}

/// Build client state and verify any stored session.
///
/// # Errors
///
/// Returns error if configuration is invalid or storage cannot be opened.
pub async fn load_session() -> Result<ClientState, CommandError> {
    let state = load_state()?;
    state.bootstrap().await;
    Ok(state)
}
