//! Persistence collaborator
//!
//! The key ring persists its collection as an opaque blob through a narrow
//! get/set interface owned by the embedding process (extension storage).
//! Two implementations ship here: an in-memory store for tests and
//! ephemeral sessions, and an on-disk store whose writes go through a
//! temp-file rename so a mutation is observable all-or-nothing.

use crate::errors::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Opaque byte-blob storage
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// File-backed store, one file per key
pub struct FileKvStore {
    base_path: PathBuf,
}

impl FileKvStore {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }
        Ok(Self { base_path })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Storage keys are namespaced with '/'; flatten for the filesystem
        self.base_path.join(key.replace('/', "_"))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.file_path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        // Rename is atomic on the same filesystem; readers never observe a
        // partially written blob
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", b"v1").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"v1");

        store.set("k", b"v2").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"v2");
    }

    #[test]
    fn test_file_store_round_trip_and_reload() {
        let dir = tempdir().unwrap();

        {
            let store = FileKvStore::new(dir.path()).unwrap();
            store.set("key-ring/multi-key-store", b"blob").unwrap();
        }

        // New store over the same directory sees the previous write
        let store = FileKvStore::new(dir.path()).unwrap();
        assert_eq!(
            store.get("key-ring/multi-key-store").unwrap().unwrap(),
            b"blob"
        );
        assert_eq!(store.get("other").unwrap(), None);
    }
}
