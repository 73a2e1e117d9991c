//! Local filesystem storage backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::storage::{StorageBackend, StorageError};

/// Storage backend keeping one file per key under a root directory.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    /// Create a new local storage backend rooted at the given path.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are flat names; anything that could leave the root is refused.
    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;

        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadError(format!("{}: {e}", path.display()))),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;

        fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::WriteError(format!("create dir {}: {e}", self.root.display()))
        })?;

        let tmp = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp, value)
            .await
            .map_err(|e| StorageError::WriteError(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::WriteError(format!("{}: {e}", path.display())))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteError(format!("{}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_creates_root_and_reads_back() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new(temp.path().join("worker"));

        backend.put("index.json", "{}").await.unwrap();
        assert_eq!(backend.get("index.json").await.unwrap().as_deref(), Some("{}"));
        assert!(backend.root().join("index.json").exists());
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new(temp.path().to_path_buf());
        assert_eq!(backend.get("metadata").await.unwrap(), None);
        backend.delete("metadata").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new(temp.path().to_path_buf());
        assert!(matches!(backend.get("../etc").await, Err(StorageError::InvalidKey(_))));
        assert!(matches!(backend.put("a/b", "x").await, Err(StorageError::InvalidKey(_))));
    }
}
