//! Platform interfaces for session storage.

use std::sync::Arc;

use super::error::StorageResult;

/// Lifetime of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// Cleared when the hosting tab or process ends. Must survive the identity provider redirect.
    Volatile,
    /// Survives restarts.
    Durable,
}

/// String key/value store for a single [`Scope`].
pub trait KeyValueStore: Send + Sync {
    /// Reads the value under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes every entry or none of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, in which case no entry is visible.
    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()>;

    /// Removes `keys`. Absent keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, keys: &[&str]) -> StorageResult<()>;

    /// Drops every value in the store, including content that can no longer be parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be emptied.
    fn clear(&self) -> StorageResult<()>;

    /// Writes a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: &str, value: String) -> StorageResult<()> {
        self.put_batch(&[(key, value)])
    }
}

/// Provider responsible for the platform's two storage scopes.
pub trait StorageProvider: Send + Sync {
    /// Returns the store backing [`Scope::Volatile`].
    fn volatile(&self) -> Arc<dyn KeyValueStore>;

    /// Returns the store backing [`Scope::Durable`].
    fn durable(&self) -> Arc<dyn KeyValueStore>;

    /// Returns the store for `scope`.
    fn scope(&self, scope: Scope) -> Arc<dyn KeyValueStore> {
        match scope {
            Scope::Volatile => self.volatile(),
            Scope::Durable => self.durable(),
        }
    }
}
