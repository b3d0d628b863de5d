//! Cart owner identities.
//!
//! Every cart is keyed by exactly one owner: either a randomly generated guest
//! identity or an authenticated user's ID.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserId;

/// A randomly generated, non-authenticated owner key (`guest-<random>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Prefix shared by every guest identity.
    pub const PREFIX: &'static str = "guest-";

    /// Generate a fresh guest identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    /// Parse a previously issued guest identity.
    ///
    /// Returns `None` if the value does not carry the guest prefix or has
    /// nothing after it.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        value
            .strip_prefix(Self::PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(|_| Self(value.to_owned()))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity a cart is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum OwnerId {
    /// An anonymous shopper.
    Guest(GuestId),
    /// An authenticated user.
    User(UserId),
}

impl OwnerId {
    /// Whether this owner is a guest identity.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// The guest identity, if this owner is a guest.
    #[must_use]
    pub const fn as_guest(&self) -> Option<&GuestId> {
        match self {
            Self::Guest(guest) => Some(guest),
            Self::User(_) => None,
        }
    }

    /// The key fragment this owner's cart is stored under.
    #[must_use]
    pub fn as_key(&self) -> &str {
        match self {
            Self::Guest(guest) => guest.as_str(),
            Self::User(user) => user.as_str(),
        }
    }
}

impl From<GuestId> for OwnerId {
    fn from(guest: GuestId) -> Self {
        Self::Guest(guest)
    }
}

impl From<UserId> for OwnerId {
    fn from(user: UserId) -> Self {
        Self::User(user)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_guest_ids_are_unique_and_prefixed() {
        let a = GuestId::generate();
        let b = GuestId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(GuestId::PREFIX));
    }

    #[test]
    fn test_guest_id_parse() {
        assert!(GuestId::parse("guest-abc").is_some());
        assert!(GuestId::parse("guest-").is_none());
        assert!(GuestId::parse("user-1").is_none());
    }

    #[test]
    fn test_owner_key() {
        let guest = OwnerId::from(GuestId::parse("guest-xyz").unwrap_or_else(GuestId::generate));
        assert_eq!(guest.as_key(), "guest-xyz");
        assert!(guest.is_guest());

        let user = OwnerId::from(UserId::new("42"));
        assert_eq!(user.to_string(), "42");
        assert!(user.as_guest().is_none());
    }
}
