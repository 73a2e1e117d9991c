//! Local cache for a fetched search index.
//!
//! Two interchangeable backends are available: [`IndexedStore`], a
//! versioned database with one object store, and [`LocalStore`], a single
//! quota-limited key-value file. [`CacheLayer`] picks one at construction and
//! owns the staleness policy so the backends stay dumb.

pub mod indexed;
pub mod local;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use indexed::IndexedStore;
pub use local::LocalStore;

use crate::index::SearchIndexEntry;

/// Cached indexes older than this are deleted and refetched (1 hour).
pub const CACHE_TTL_MS: i64 = 60 * 60 * 1000;

/// Errors from cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cached entry {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Quota exceeded writing {key}: {size} bytes over a {quota} byte quota")]
    QuotaExceeded { key: String, size: usize, quota: usize },
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A cached copy of the index as fetched over the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheData {
    pub index: Vec<SearchIndexEntry>,
    /// Fetch time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl CacheData {
    #[must_use]
    pub fn new(index: Vec<SearchIndexEntry>, etag: Option<String>) -> Self {
        Self {
            index,
            timestamp: now_millis(),
            etag,
        }
    }

    /// Whether the entry is younger than [`CACHE_TTL_MS`] at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: i64) -> bool {
        now - self.timestamp < CACHE_TTL_MS
    }
}

/// A key-value store for [`CacheData`].
pub trait CacheBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store cannot be read or the entry is corrupt.
    fn get(&self, key: &str) -> Result<Option<CacheData>, CacheError>;

    /// Store `data` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the write fails or exceeds the store's quota.
    fn put(&self, key: &str, data: &CacheData) -> Result<(), CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store cannot be updated.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Backend selection plus the freshness policy shared by all backends.
///
/// Every failure is logged and absorbed: a broken cache only costs a refetch.
pub struct CacheLayer {
    backend: Option<Box<dyn CacheBackend>>,
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl CacheLayer {
    #[must_use]
    pub fn new(backend: Option<Box<dyn CacheBackend>>) -> Self {
        Self { backend }
    }

    /// A layer that never caches.
    #[must_use]
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Probe for a usable backend under `root`: the indexed store first, then
    /// the key-value file, then none.
    #[must_use]
    pub fn detect(root: Option<&Path>) -> Self {
        let Some(root) = root else {
            return Self::disabled();
        };

        match IndexedStore::open(root) {
            Ok(store) => return Self::new(Some(Box::new(store))),
            Err(e) => tracing::debug!(error = %e, "Indexed cache store unavailable"),
        }

        match LocalStore::open(root.join(local::DEFAULT_FILE_NAME), local::DEFAULT_QUOTA) {
            Ok(store) => Self::new(Some(Box::new(store))),
            Err(e) => {
                tracing::debug!(error = %e, "Local cache store unavailable");
                Self::disabled()
            }
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Return the cached entry if it is fresh now.
    #[must_use]
    pub fn load_fresh(&self, key: &str) -> Option<CacheData> {
        self.load_fresh_at(key, now_millis())
    }

    /// Return the cached entry if it is fresh at `now`.
    ///
    /// Expired and corrupt entries are deleted from the backend.
    #[must_use]
    pub fn load_fresh_at(&self, key: &str, now: i64) -> Option<CacheData> {
        let backend = self.backend.as_ref()?;

        match backend.get(key) {
            Ok(Some(data)) if data.is_fresh_at(now) => Some(data),
            Ok(Some(data)) => {
                tracing::debug!(key, age_ms = now - data.timestamp, "Cached index expired");
                evict(backend.as_ref(), key);
                None
            }
            Ok(None) => None,
            Err(e @ CacheError::Corrupt { .. }) => {
                tracing::warn!(key, error = %e, "Discarding corrupt cached index");
                evict(backend.as_ref(), key);
                None
            }
            Err(e) => {
                tracing::warn!(key, backend = backend.name(), error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Store `data`. A failed write deletes whatever is stored under `key`.
    pub fn store(&self, key: &str, data: &CacheData) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        if let Err(e) = backend.put(key, data) {
            tracing::warn!(key, backend = backend.name(), error = %e, "Cache write failed");
            evict(backend.as_ref(), key);
        }
    }
}

fn evict(backend: &dyn CacheBackend, key: &str) {
    if let Err(e) = backend.delete(key) {
        tracing::warn!(key, backend = backend.name(), error = %e, "Cache delete failed");
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemoryBackend {
        items: Mutex<HashMap<String, CacheData>>,
        fail_writes: bool,
    }

    impl CacheBackend for MemoryBackend {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn get(&self, key: &str) -> Result<Option<CacheData>, CacheError> {
            Ok(self.items.lock().get(key).cloned())
        }

        fn put(&self, key: &str, data: &CacheData) -> Result<(), CacheError> {
            if self.fail_writes {
                return Err(CacheError::QuotaExceeded {
                    key: key.to_string(),
                    size: 1,
                    quota: 0,
                });
            }
            self.items.lock().insert(key.to_string(), data.clone());
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.items.lock().remove(key);
            Ok(())
        }
    }

    fn data_at(timestamp: i64) -> CacheData {
        CacheData {
            index: vec![],
            timestamp,
            etag: None,
        }
    }

    #[test]
    fn freshness_window() {
        let now = 10_000_000;
        assert!(!data_at(now - 3_700_000).is_fresh_at(now));
        assert!(data_at(now - 3_500_000).is_fresh_at(now));
    }

    #[test]
    fn expired_entries_are_deleted() {
        let layer = CacheLayer::new(Some(Box::new(MemoryBackend::default())));
        let now = 10_000_000;
        layer.store("k", &data_at(now - 3_700_000));

        assert!(layer.load_fresh_at("k", now).is_none());
        // Gone even when asked with an earlier clock.
        assert!(layer.load_fresh_at("k", now - 3_700_000).is_none());
    }

    #[test]
    fn fresh_entries_are_returned() {
        let layer = CacheLayer::new(Some(Box::new(MemoryBackend::default())));
        let now = 10_000_000;
        layer.store("k", &data_at(now - 3_500_000));
        assert!(layer.load_fresh_at("k", now).is_some());
    }

    #[test]
    fn failed_write_is_absorbed() {
        let backend = MemoryBackend {
            fail_writes: true,
            ..Default::default()
        };
        backend
            .items
            .lock()
            .insert("k".to_string(), data_at(now_millis()));

        let layer = CacheLayer::new(Some(Box::new(backend)));
        layer.store("k", &data_at(now_millis()));
        assert!(layer.load_fresh("k").is_none());
    }

    #[test]
    fn detect_prefers_indexed_store() {
        let temp = tempfile::tempdir().unwrap();
        let layer = CacheLayer::detect(Some(temp.path()));
        assert_eq!(layer.backend_name(), Some("indexed"));
    }

    #[test]
    fn detect_falls_back_to_local_store() {
        let temp = tempfile::tempdir().unwrap();
        // A plain file where the database directory would go.
        std::fs::write(temp.path().join(indexed::DATABASE_NAME), "occupied").unwrap();

        let layer = CacheLayer::detect(Some(temp.path()));
        assert_eq!(layer.backend_name(), Some("local"));

        let data = CacheData::new(vec![], Some("\"v1\"".to_string()));
        layer.store("k", &data);
        let cached = layer.load_fresh("k").unwrap();
        assert_eq!(cached.etag.as_deref(), Some("\"v1\""));
        assert!(temp.path().join(local::DEFAULT_FILE_NAME).is_file());
    }

    #[test]
    fn detect_without_root_is_disabled() {
        assert_eq!(CacheLayer::detect(None).backend_name(), None);
    }

    #[test]
    fn disabled_layer_never_hits() {
        let layer = CacheLayer::disabled();
        layer.store("k", &data_at(now_millis()));
        assert!(layer.load_fresh("k").is_none());
        assert_eq!(layer.backend_name(), None);
    }
}
