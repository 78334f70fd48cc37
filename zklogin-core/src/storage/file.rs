//! Durable store persisted as a single JSON object on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::{StorageError, StorageResult};
use super::traits::KeyValueStore;

/// Key/value store backed by one JSON file.
///
/// Every mutation rewrites the whole file through a temporary sibling followed by a rename,
/// so a batch is either fully visible on disk or not at all.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens (lazily) the store at `path`. Parent directories are created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(StorageError::io(&self.path, &err)),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, &err))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(|err| StorageError::io(&tmp, &err))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| StorageError::io(&tmp, &err))?;
        fs::rename(&tmp, &self.path).map_err(|err| StorageError::io(&self.path, &err))
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock()?;
        Ok(self.read_map()?.remove(key))
    }

    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        let _guard = self.lock()?;
        let mut map = self.read_map()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_map(&map)
    }

    fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.lock()?;
        let mut map = self.read_map()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.write_map(&map)
    }

    fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(&self.path, &err)),
        }
    }
}
