//! Persistence for the index worker.
//!
//! The worker keeps the full index as one object (`index.json`) and a small
//! metadata record (`metadata`) in a separate fast store, so health and stats
//! requests never read the full index. Both sit behind [`StorageBackend`],
//! whose operations are async so request handlers never block on disk.

pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::index::{IndexData, IndexError, IndexMetadata, SearchIndexEntry};

/// Object key of the persisted [`IndexData`].
pub const INDEX_KEY: &str = "index.json";

/// Key of the persisted [`IndexMetadata`].
pub const METADATA_KEY: &str = "metadata";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read: {0}")]
    ReadError(String),

    #[error("Failed to write: {0}")]
    WriteError(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Failed to serialize: {0}")]
    SerializeError(String),
}

/// Trait for string-valued key stores (local directory, memory, ...).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be updated.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed access to the worker's index object and metadata record.
#[derive(Clone)]
pub struct IndexStore {
    objects: Arc<dyn StorageBackend>,
    metadata: Arc<dyn StorageBackend>,
}

impl IndexStore {
    #[must_use]
    pub fn new(objects: Arc<dyn StorageBackend>, metadata: Arc<dyn StorageBackend>) -> Self {
        Self { objects, metadata }
    }

    /// Read the metadata record. A missing or unparsable record is `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the metadata store cannot be read.
    pub async fn read_metadata(&self) -> Result<Option<IndexMetadata>, StorageError> {
        let Some(raw) = self.metadata.get(METADATA_KEY).await? else {
            return Ok(None);
        };

        Ok(serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(error = %e, "Ignoring corrupt index metadata"))
            .ok())
    }

    /// Read the persisted index. A missing or unparsable object is `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the object store cannot be read.
    pub async fn read_index(&self) -> Result<Option<IndexData>, StorageError> {
        let Some(raw) = self.objects.get(INDEX_KEY).await? else {
            return Ok(None);
        };

        Ok(serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(error = %e, "Ignoring corrupt index object"))
            .ok())
    }

    /// Entries of the persisted index, empty when there is none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the object store cannot be read.
    pub async fn read_entries(&self) -> Result<Vec<SearchIndexEntry>, StorageError> {
        Ok(self.read_index().await?.map(|data| data.entries).unwrap_or_default())
    }

    /// Persist `entries` as the whole index, then refresh the metadata.
    ///
    /// The two writes are sequential; if the second fails the metadata is
    /// stale until the next write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails.
    pub async fn write_entries(&self, entries: Vec<SearchIndexEntry>) -> Result<IndexMetadata, StorageError> {
        let data = IndexData::new(entries);
        let (body, metadata) = data.to_stored()?;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| StorageError::SerializeError(e.to_string()))?;

        self.objects.put(INDEX_KEY, &body).await?;
        self.metadata.put(METADATA_KEY, &metadata_json).await?;

        Ok(metadata)
    }
}
