//! In-memory store, used for the volatile scope and in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::error::{StorageError, StorageResult};
use super::traits::KeyValueStore;

/// Process-lifetime key/value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        let mut guard = self.lock()?;
        for (key, value) in entries {
            guard.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let mut guard = self.lock()?;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_then_remove() {
        let store = MemoryStore::new();
        store
            .put_batch(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len().unwrap(), 2);

        store.remove(&["a", "missing"]).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put("k", "old".to_string()).unwrap();
        store.put("k", "new".to_string()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("new"));
        assert!(!store.is_empty().unwrap());

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }
}
