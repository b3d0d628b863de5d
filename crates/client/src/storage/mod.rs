//! Local key/value persistence.
//!
//! # Architecture
//!
//! State is persisted to two redundant namespaces:
//! - **session** ([`MemoryStorage`]) - fast, process-scoped, idle-expiring
//! - **durable** ([`FileStorage`]) - survives restarts
//!
//! [`TwoTierStorage`] writes every key to both and reads the session namespace
//! first, falling back to the durable one. Losing the session namespace
//! therefore never drops a token the durable namespace still holds.
//!
//! Persistence is fire-and-forget: failures are logged and swallowed, and the
//! in-memory state stays authoritative.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use secure_store_core::OwnerId;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key cannot be mapped onto the backend.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Which namespace a backend represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Cleared when the session ends.
    Session,
    /// Survives restarts.
    Durable,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Durable => write!(f, "durable"),
        }
    }
}

/// A string key/value backend.
pub trait Storage: Send + Sync {
    /// The namespace this backend represents.
    fn namespace(&self) -> Namespace;

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every value in the namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Storage keys shared by both namespaces.
pub mod keys {
    use super::OwnerId;

    /// Bearer token of the current session.
    pub const AUTH_TOKEN: &str = "auth.token";

    /// Cached user identity of the current session.
    pub const AUTH_USER: &str = "auth.user";

    /// Most recent guest identity recorded for a possible merge.
    pub const PENDING_GUEST: &str = "cart.pending_guest";

    /// Order ID of the checkout in progress.
    pub const CURRENT_ORDER: &str = "checkout.current_order";

    /// Key of the cart persisted for `owner`.
    #[must_use]
    pub fn cart(owner: &OwnerId) -> String {
        format!("cart.{}", owner.as_key())
    }
}

/// Primary (session) + backup (durable) persistence.
#[derive(Clone)]
pub struct TwoTierStorage {
    primary: Arc<dyn Storage>,
    backup: Arc<dyn Storage>,
}

impl TwoTierStorage {
    /// Combine a primary and a backup backend.
    #[must_use]
    pub fn new(primary: Arc<dyn Storage>, backup: Arc<dyn Storage>) -> Self {
        Self { primary, backup }
    }

    /// Read a value from the primary namespace, falling back to the backup.
    ///
    /// A value found only in the backup is copied back into the primary.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        match self.primary.get(key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => warn!(
                namespace = %self.primary.namespace(),
                key,
                error = %e,
                "Storage read failed"
            ),
        }

        let value = match self.backup.get(key) {
            Ok(value) => value?,
            Err(e) => {
                warn!(
                    namespace = %self.backup.namespace(),
                    key,
                    error = %e,
                    "Storage read failed"
                );
                return None;
            }
        };

        debug!(key, "Restoring primary storage from backup");
        log_failure(self.primary.as_ref(), key, self.primary.set(key, &value));
        Some(value)
    }

    /// Write a value to both namespaces.
    pub fn write(&self, key: &str, value: &str) {
        for storage in [&self.primary, &self.backup] {
            log_failure(storage.as_ref(), key, storage.set(key, value));
        }
    }

    /// Delete a value from both namespaces.
    pub fn delete(&self, key: &str) {
        for storage in [&self.primary, &self.backup] {
            log_failure(storage.as_ref(), key, storage.remove(key));
        }
    }

    /// Read and decode a JSON value.
    ///
    /// Undecodable values are logged and treated as absent.
    #[must_use]
    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable stored value");
                None
            }
        }
    }

    /// Encode and write a JSON value to both namespaces.
    pub fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write(key, &raw),
            Err(e) => warn!(key, error = %e, "Failed to encode value for storage"),
        }
    }

    /// The session-scoped backend.
    #[must_use]
    pub fn primary(&self) -> &Arc<dyn Storage> {
        &self.primary
    }

    /// The durable backend.
    #[must_use]
    pub fn backup(&self) -> &Arc<dyn Storage> {
        &self.backup
    }
}

impl std::fmt::Debug for TwoTierStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierStorage")
            .field("primary", &self.primary.namespace())
            .field("backup", &self.backup.namespace())
            .finish()
    }
}

fn log_failure(storage: &dyn Storage, key: &str, result: Result<(), StorageError>) {
    if let Err(e) = result {
        warn!(
            namespace = %storage.namespace(),
            key,
            error = %e,
            "Storage write failed"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;

    /// A backend whose every operation fails.
    pub(crate) struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn namespace(&self) -> Namespace {
            Namespace::Durable
        }

        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey("broken".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey("broken".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey("broken".to_string()))
        }

        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey("broken".to_string()))
        }
    }

    /// Two in-memory namespaces, handy for unit tests.
    pub(crate) fn memory_pair() -> (Arc<MemoryStorage>, Arc<MemoryStorage>, TwoTierStorage) {
        let session = Arc::new(MemoryStorage::new(Duration::from_secs(60)));
        let durable = Arc::new(MemoryStorage::durable());
        let storage = TwoTierStorage::new(session.clone(), durable.clone());
        (session, durable, storage)
    }

    #[test]
    fn test_write_reaches_both_namespaces() {
        let (session, durable, storage) = memory_pair();
        storage.write(keys::AUTH_TOKEN, "abc");

        assert_eq!(session.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("abc"));
        assert_eq!(durable.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_read_falls_back_to_backup_and_reseeds_primary() {
        let (session, _durable, storage) = memory_pair();
        storage.write(keys::AUTH_TOKEN, "abc");
        session.clear().unwrap();

        assert_eq!(storage.read(keys::AUTH_TOKEN).as_deref(), Some("abc"));
        assert_eq!(session.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_delete_clears_both_namespaces() {
        let (session, durable, storage) = memory_pair();
        storage.write(keys::AUTH_USER, "{}");
        storage.delete(keys::AUTH_USER);

        assert!(session.get(keys::AUTH_USER).unwrap().is_none());
        assert!(durable.get(keys::AUTH_USER).unwrap().is_none());
    }

    #[test]
    fn test_broken_backup_is_swallowed() {
        let session = Arc::new(MemoryStorage::new(Duration::from_secs(60)));
        let storage = TwoTierStorage::new(session.clone(), Arc::new(BrokenStorage));

        storage.write(keys::AUTH_TOKEN, "abc");
        storage.delete(keys::PENDING_GUEST);

        assert_eq!(storage.read(keys::AUTH_TOKEN).as_deref(), Some("abc"));
        assert!(storage.read(keys::PENDING_GUEST).is_none());
    }

    #[test]
    fn test_read_json_discards_garbage() {
        let (_session, _durable, storage) = memory_pair();
        storage.write(keys::AUTH_USER, "not json");
        assert!(storage.read_json::<serde_json::Value>(keys::AUTH_USER).is_none());
    }
}
