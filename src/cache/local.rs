//! Single-file key-value cache with a byte quota.
//!
//! Values are stored as JSON strings in one object, mirroring how a browser's
//! local storage holds serialized data under string keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::cache::{CacheBackend, CacheData, CacheError};

pub const DEFAULT_FILE_NAME: &str = "local-storage.json";

/// Default quota (5 MiB).
pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

/// Key-value file cache backend.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    quota: usize,
    lock: Mutex<()>,
}

impl LocalStore {
    /// Open the store file at `path`, creating its directory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the parent directory cannot be created.
    pub fn open(path: PathBuf, quota: usize) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        Ok(Self {
            path,
            quota,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored item. An unreadable or corrupt file counts as empty.
    fn read_items(&self) -> BTreeMap<String, String> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt local cache file");
            BTreeMap::new()
        })
    }

    fn write_items(&self, items: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let contents = serde_json::to_string(items).map_err(CacheError::Serialize)?;
        fs::write(&self.path, contents).map_err(|e| CacheError::io(&self.path, e))
    }
}

fn used_bytes(items: &BTreeMap<String, String>) -> usize {
    items.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl CacheBackend for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn get(&self, key: &str) -> Result<Option<CacheData>, CacheError> {
        let _guard = self.lock.lock();

        let Some(raw) = self.read_items().remove(key) else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn put(&self, key: &str, data: &CacheData) -> Result<(), CacheError> {
        let _guard = self.lock.lock();

        let value = serde_json::to_string(data).map_err(CacheError::Serialize)?;
        let mut items = self.read_items();
        items.insert(key.to_string(), value);

        let size = used_bytes(&items);
        if size > self.quota {
            return Err(CacheError::QuotaExceeded {
                key: key.to_string(),
                size,
                quota: self.quota,
            });
        }

        self.write_items(&items)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock();

        let mut items = self.read_items();
        if items.remove(key).is_some() {
            self.write_items(&items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndexEntry;
    use tempfile::TempDir;

    fn entry(content: &str) -> SearchIndexEntry {
        SearchIndexEntry {
            url: "/a".to_string(),
            title: "A".to_string(),
            description: String::new(),
            content: content.to_string(),
            tags: vec![],
            keywords: vec![],
        }
    }

    #[test]
    fn round_trips_through_the_file() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path().join("ls.json"), DEFAULT_QUOTA).unwrap();
        let data = CacheData::new(vec![entry("hello")], None);

        store.put("key", &data).unwrap();
        assert_eq!(store.get("key").unwrap(), Some(data));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn quota_is_enforced() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path().join("ls.json"), 256).unwrap();
        let big = CacheData::new(vec![entry(&"x".repeat(1024))], None);

        assert!(matches!(
            store.put("key", &big),
            Err(CacheError::QuotaExceeded { .. })
        ));
        assert_eq!(store.get("key").unwrap(), None);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ls.json");
        fs::write(&path, "garbage").unwrap();

        let store = LocalStore::open(path, DEFAULT_QUOTA).unwrap();
        assert_eq!(store.get("key").unwrap(), None);
    }

    #[test]
    fn corrupt_value_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ls.json");
        fs::write(&path, r#"{"key": "not cache data"}"#).unwrap();

        let store = LocalStore::open(path, DEFAULT_QUOTA).unwrap();
        assert!(matches!(store.get("key"), Err(CacheError::Corrupt { .. })));
    }
}
