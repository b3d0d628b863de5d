//! Core types for Secure Store.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod owner;
pub mod price;
pub mod role;
pub mod user;

pub use cart::{Cart, CartItem, CartView, Product};
pub use id::*;
pub use owner::{GuestId, OwnerId};
pub use price::{Price, PriceError};
pub use role::Role;
pub use user::UserIdentity;
