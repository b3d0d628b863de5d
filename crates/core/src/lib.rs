//! Secure Store Core - Shared domain types.
//!
//! This crate provides the types used by the client state layer and its
//! front ends:
//! - `client` - Auth session, cart, and sync library
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart logic - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, roles, user identities, and carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
