//! In-memory storage backed by a `moka` cache.

use std::time::Duration;

use moka::sync::Cache;

use super::{Namespace, Storage, StorageError};

const MAX_ENTRIES: u64 = 10_000;

/// Process-scoped key/value storage.
///
/// Used for the session namespace, where entries expire after sitting idle
/// for the session timeout.
#[derive(Clone)]
pub struct MemoryStorage {
    cache: Cache<String, String>,
    namespace: Namespace,
}

impl MemoryStorage {
    /// Session-scoped storage whose entries expire after `idle_timeout`.
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_idle(idle_timeout)
            .build();

        Self {
            cache,
            namespace: Namespace::Session,
        }
    }

    /// Non-expiring storage standing in for the durable namespace.
    ///
    /// Nothing survives the process; useful for ephemeral runs and tests.
    #[must_use]
    pub fn durable() -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_ENTRIES).build(),
            namespace: Namespace::Durable,
        }
    }
}

impl Storage for MemoryStorage {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.cache.get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.cache.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.cache.invalidate(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.cache.invalidate_all();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("namespace", &self.namespace)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
