//! Backend and catalog commands.

use super::{CommandError, load_session, load_state};

/// Check that the backend is reachable.
///
/// # Errors
///
/// Returns error if the backend is unreachable or unhealthy.
pub async fn health() -> Result<(), CommandError> {
    let state = load_state()?;
    if state.gateway().health().await? {
        tracing::info!("Backend healthy at {}", state.config().api.base);
    } else {
        tracing::warn!("Backend at {} reports unhealthy", state.config().api.base);
    }
    Ok(())
}

/// List products available for purchase.
///
/// # Errors
///
/// Returns error if the catalog cannot be fetched.
pub async fn products() -> Result<(), CommandError> {
    let state = load_session().await?;
    let products = state.gateway().products().await?;

    if products.is_empty() {
        tracing::info!("No products available");
    }
    for product in products {
        tracing::info!("{:<24} {:<32} {}", product.id.as_str(), product.name, product.price);
    }
    Ok(())
}

/// List the signed-in user's orders.
///
/// # Errors
///
/// Returns error if there is no session or the request fails.
pub async fn orders() -> Result<(), CommandError> {
    let state = load_session().await?;
    if !state.auth().state().is_authenticated() {
        return Err(CommandError::NotLoggedIn);
    }

    let orders = state.gateway().my_orders().await?;
    tracing::info!("{} order(s)", orders.len());
    for order in orders {
        tracing::info!("{order}");
    }
    Ok(())
}
