//! Session storage: two scoped key/value stores and the persisted layout.

pub mod error;
pub mod file;
pub mod keys;
pub mod memory;
pub mod traits;

use std::path::Path;
use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use keys::StorageKey;
pub use memory::MemoryStore;
pub use traits::{KeyValueStore, Scope, StorageProvider};

/// A [`StorageProvider`] assembled from two independent stores.
#[derive(Clone)]
pub struct SplitStorage {
    volatile: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl SplitStorage {
    /// Pairs a volatile and a durable store.
    #[must_use]
    pub fn new(volatile: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { volatile, durable }
    }

    /// Both scopes in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Both scopes as JSON files under `dir`: `session.json` (volatile) and `profile.json` (durable).
    #[must_use]
    pub fn in_directory(dir: &Path) -> Self {
        Self::new(
            Arc::new(FileStore::new(dir.join("session.json"))),
            Arc::new(FileStore::new(dir.join("profile.json"))),
        )
    }
}

impl std::fmt::Debug for SplitStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitStorage").finish_non_exhaustive()
    }
}

impl StorageProvider for SplitStorage {
    fn volatile(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.volatile)
    }

    fn durable(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.durable)
    }
}
