//! Search provider contract.
//!
//! Every provider follows the same lifecycle: `initialize` with its own
//! configuration, then any number of `search` calls. `search` never fails;
//! an empty result is the only signal a caller gets for query-time problems.
//! Providers that can also accept entries directly implement
//! [`IndexingProvider`] and expose it through
//! [`SearchProvider::as_indexing`].

pub mod client;
pub mod cloudflare;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ClientSearchConfig, CloudflareSearchConfig};
use crate::index::{IndexError, SearchIndexEntry, SearchResult};
use crate::search::SearchOptions;

pub use client::ClientSearchProvider;
pub use cloudflare::{AppendConfig, CloudflareSearchProvider};
pub use registry::ProviderRegistry;

/// Errors raised by provider setup and administrative calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid search provider configuration: {0}")]
    Config(String),

    #[error("Failed to connect to search worker at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Search worker returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response from search worker: {0}")]
    InvalidResponse(String),

    #[error("Failed to load search index from {location}: {message}")]
    IndexFetch { location: String, message: String },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Provider-specific configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Client(ClientSearchConfig),
    Cloudflare(CloudflareSearchConfig),
}

/// Outcome of a successful `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub index_size: usize,
}

/// Uniform interface over search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Registry name of this provider.
    fn name(&self) -> &str;

    /// Prepare the provider for searching.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on unrecoverable setup failure, such as a
    /// missing required setting.
    async fn initialize(&self, config: ProviderConfig) -> Result<InitializeResult, ProviderError>;

    /// Run a query. Returns an empty list for blank queries, before
    /// initialization, and on any failure.
    async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult>;

    /// The indexing capability, when the provider has one.
    fn as_indexing(&self) -> Option<&dyn IndexingProvider> {
        None
    }
}

/// Optional capability: accept entries directly instead of loading them.
#[async_trait]
pub trait IndexingProvider: Send + Sync {
    /// Replace the provider's index with `entries`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the index cannot be replaced.
    async fn index(&self, entries: Vec<SearchIndexEntry>) -> Result<InitializeResult, ProviderError>;

    /// Merge `entries` into the current index, replacing entries with the same url.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the index cannot be updated.
    async fn update_index(
        &self,
        entries: Vec<SearchIndexEntry>,
    ) -> Result<InitializeResult, ProviderError>;
}
