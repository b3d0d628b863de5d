//! Authenticated user identity.

use serde::{Deserialize, Serialize};

use crate::types::{Role, UserId};

/// The identity of a logged-in user.
///
/// Sourced from the login payload or from a profile fetch; the profile fetch
/// is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Backend user ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Role granted by the backend.
    #[serde(default)]
    pub role: Role,
}

impl UserIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
        }
    }

    /// Whether this user has the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
