//! Search index records and their serialized forms.
//!
//! A [`SearchIndexEntry`] is the unit that flows through every part of the
//! crate: the builder produces them, the engine indexes them, the client cache
//! and the worker persist them.

pub mod generator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version string stamped into persisted [`IndexData`].
pub const INDEX_VERSION: &str = "1.0";

/// Errors raised when reading or writing serialized indexes.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to serialize search index: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse search index: {0}")]
    Parse(#[source] serde_json::Error),
}

/// One indexed document.
///
/// `url` is the primary key within an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    /// Navigation target, unique within an index.
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Terms derived from title and description at build time.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A ranked hit returned from a query.
///
/// `score` is only meaningful for ordering results of the same query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// The persisted index held by the worker's object store (`index.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexData {
    pub entries: Vec<SearchIndexEntry>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub version: String,
}

/// Summary of [`IndexData`] kept in the worker's metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub timestamp: i64,
    pub version: String,
    pub entry_count: usize,
    /// Size in bytes of the serialized [`IndexData`].
    pub index_size: usize,
}

impl IndexData {
    /// Stamp a set of entries with the current time and index version.
    #[must_use]
    pub fn new(entries: Vec<SearchIndexEntry>) -> Self {
        Self {
            entries,
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: INDEX_VERSION.to_string(),
        }
    }

    /// Serialize to the stored JSON form and derive its metadata.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Serialize` if the entries cannot be encoded.
    pub fn to_stored(&self) -> Result<(String, IndexMetadata), IndexError> {
        let body = serde_json::to_string(self).map_err(IndexError::Serialize)?;
        let metadata = IndexMetadata {
            timestamp: self.timestamp,
            version: self.version.clone(),
            entry_count: self.entries.len(),
            index_size: body.len(),
        };
        Ok((body, metadata))
    }
}

/// Serialize entries to the pretty-printed `search-index.json` form.
///
/// # Errors
///
/// Returns `IndexError::Serialize` if encoding fails.
pub fn serialize_search_index(entries: &[SearchIndexEntry]) -> Result<String, IndexError> {
    serde_json::to_string_pretty(entries).map_err(IndexError::Serialize)
}

/// Parse a `search-index.json` document. Whitespace is insignificant.
///
/// # Errors
///
/// Returns `IndexError::Parse` if the input is not a JSON array of entries.
pub fn deserialize_search_index(json: &str) -> Result<Vec<SearchIndexEntry>, IndexError> {
    serde_json::from_str(json).map_err(IndexError::Parse)
}
