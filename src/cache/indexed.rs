//! Versioned on-disk database with a single object store.
//!
//! Layout under the cache root:
//!
//! ```text
//! duct-search/
//!   version            schema version, currently "1"
//!   search-index/      object store, one JSON file per key
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{CacheBackend, CacheData, CacheError};

pub const DATABASE_NAME: &str = "duct-search";
pub const DATABASE_VERSION: u32 = 1;
pub const STORE_NAME: &str = "search-index";

/// Object-store cache backend.
#[derive(Debug)]
pub struct IndexedStore {
    store_dir: PathBuf,
}

impl IndexedStore {
    /// Open the database under `root`, creating or upgrading it as needed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the database directory is not writable.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        let db_dir = root.join(DATABASE_NAME);
        let version_path = db_dir.join("version");
        let store_dir = db_dir.join(STORE_NAME);

        let current = fs::read_to_string(&version_path)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);

        if current < DATABASE_VERSION || !store_dir.is_dir() {
            fs::create_dir_all(&store_dir).map_err(|e| CacheError::io(&store_dir, e))?;
            fs::write(&version_path, DATABASE_VERSION.to_string())
                .map_err(|e| CacheError::io(&version_path, e))?;
            tracing::debug!(path = %db_dir.display(), version = DATABASE_VERSION, "Cache database upgraded");
        }

        Ok(Self { store_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.store_dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl CacheBackend for IndexedStore {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn get(&self, key: &str) -> Result<Option<CacheData>, CacheError> {
        let path = self.key_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).map_err(|e| CacheError::io(&path, e))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn put(&self, key: &str, data: &CacheData) -> Result<(), CacheError> {
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string(data).map_err(CacheError::Serialize)?;

        fs::write(&tmp, contents).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }
}
