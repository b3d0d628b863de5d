//! Checkout commands.
//!
//! # Usage
//!
//! ```bash
//! ss-cli checkout submit --name "Ann" --address "1 Main St" --city Springfield \
//!     --state IL --zip 62701 --country US --email ann@example.com
//! ss-cli checkout status
//! ss-cli checkout finish
//! ```

use secure_store_client::api::types::ShippingInfo;

use super::{CommandError, load_session, load_state};

/// Submit the active cart as an order.
///
/// # Errors
///
/// Returns error if the cart is empty or the backend refuses the order.
pub async fn submit(shipping: ShippingInfo) -> Result<(), CommandError> {
    let state = load_session().await?;
    let receipt = state.checkout().submit(shipping).await?;

    tracing::info!("Order {} created", receipt.order_id);
    if let Some(message) = receipt.message {
        tracing::info!("{message}");
    }
    tracing::info!("Check payment with `ss-cli checkout status`");
    Ok(())
}

/// Show the payment status of the current order.
///
/// # Errors
///
/// Returns error if the request fails.
pub async fn status() -> Result<(), CommandError> {
    let state = load_session().await?;
    match state.checkout().payment_status().await? {
        Some(status) => tracing::info!("Payment status: {status}"),
        None => tracing::info!("No order in progress"),
    }
    Ok(())
}

/// Leave the checkout flow.
///
/// # Errors
///
/// Returns error if client state cannot be created.
pub fn finish() -> Result<(), CommandError> {
    let state = load_state()?;
    state.checkout().finish();
    Ok(())
}
