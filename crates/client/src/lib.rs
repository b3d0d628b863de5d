//! Secure Store Client - auth session, cart, and sync layer.
//!
//! This crate holds the client-side state of the storefront: who is signed
//! in, what is in the cart, and how both survive restarts and session
//! changes.
//!
//! # Architecture
//!
//! ```text
//!   ClientState
//!    ├── AuthManager ──(subscribe)──▶ Reconciler ──▶ CartManager
//!    ├── Gateway ──(401 ⇒ logout)──▶ AuthManager
//!    ├── CheckoutFlow ──▶ Gateway, CartManager, NavigationContext
//!    └── TwoTierStorage (session namespace + durable namespace)
//! ```
//!
//! State lives in [`observable::Observable`] containers that publish
//! immutable snapshots. Persistence is fire-and-forget: storage failures are
//! logged and never surface to callers.
//!
//! # Modules
//!
//! - [`auth`] - Session state machine and token handling
//! - [`cart`] - Active cart with per-owner persistence
//! - [`reconcile`] - Guest/user cart switching and merging
//! - [`gateway`] - Authenticated requests and typed backend calls
//! - [`checkout`] - Order submission
//! - [`api`] - Low-level HTTP client and wire types
//! - [`storage`] - Key/value backends and the two-tier wrapper

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod navigation;
pub mod observable;
pub mod reconcile;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use auth::{AuthManager, AuthPhase, AuthState};
pub use cart::{CartManager, CartState};
pub use checkout::{CheckoutError, CheckoutFlow, CheckoutReceipt};
pub use config::ClientConfig;
pub use error::{ApiError, ClientError};
pub use gateway::Gateway;
pub use state::ClientState;
