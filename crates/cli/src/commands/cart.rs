//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! ss-cli cart show
//! ss-cli cart add <product-id>
//! ss-cli cart update <product-id> <quantity>
//! ss-cli cart remove <product-id>
//! ss-cli cart clear
//! ```

use secure_store_client::ClientState;
use secure_store_core::ProductId;

use super::{CommandError, load_session};

/// Print the active cart.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub async fn show() -> Result<(), CommandError> {
    let state = load_session().await?;
    print_cart(&state);
    Ok(())
}

/// Add one unit of a catalog product.
///
/// # Errors
///
/// Returns [`CommandError::ProductNotFound`] if the product is not for sale.
pub async fn add(product_id: &str) -> Result<(), CommandError> {
    let state = load_session().await?;
    let id = ProductId::new(product_id);

    let product = state
        .gateway()
        .products()
        .await?
        .into_iter()
        .find(|product| product.id == id)
        .ok_or_else(|| CommandError::ProductNotFound(product_id.to_owned()))?;

    tracing::info!("Added {}", product.name);
    state.cart().add_item(product);
    print_cart(&state);
    Ok(())
}

/// Set a line's quantity; zero or less removes it.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub async fn update(product_id: &str, quantity: i64) -> Result<(), CommandError> {
    let state = load_session().await?;
    state
        .cart()
        .update_quantity(&ProductId::new(product_id), quantity);
    print_cart(&state);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub async fn remove(product_id: &str) -> Result<(), CommandError> {
    let state = load_session().await?;
    state.cart().remove_item(&ProductId::new(product_id));
    print_cart(&state);
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub async fn clear() -> Result<(), CommandError> {
    let state = load_session().await?;
    state.cart().clear();
    tracing::info!("Cart cleared");
    Ok(())
}

pub(crate) fn print_cart(state: &ClientState) {
    let snapshot = state.cart().snapshot();
    let owner = if snapshot.owner.is_guest() {
        "guest".to_string()
    } else {
        format!("user {}", snapshot.owner.as_key())
    };

    if snapshot.cart.is_empty() {
        tracing::info!("Cart ({owner}) is empty");
        return;
    }

    tracing::info!("Cart ({owner}):");
    for item in snapshot.cart.items() {
        tracing::info!(
            "  {:<24} {:<32} {} x {} = ${:.2}",
            item.id.as_str(),
            item.name,
            item.quantity,
            item.price,
            item.line_total()
        );
    }
    let view = snapshot.view();
    tracing::info!("  {} item(s), total ${:.2}", view.count, view.total);
}
