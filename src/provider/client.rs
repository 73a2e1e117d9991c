//! Client-side provider: fetch a prebuilt index, cache it locally, search it
//! in process.
//!
//! Loading never fails hard. When neither the cache nor the network yields
//! an index the provider starts with an empty one and searches return
//! nothing until the next successful `initialize`.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::ETAG;
use url::Url;

use crate::cache::{CacheData, CacheLayer};
use crate::config::{ClientSearchConfig, expand_tilde};
use crate::index::{SearchIndexEntry, SearchResult, deserialize_search_index};
use crate::provider::{IndexingProvider, InitializeResult, ProviderConfig, ProviderError, SearchProvider};
use crate::search::{SearchEngine, SearchOptions};

/// Where the index is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    Http(Url),
    File(PathBuf),
}

impl std::fmt::Display for IndexSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexSource::Http(url) => write!(f, "{url}"),
            IndexSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl IndexSource {
    /// Resolve `index_url` to an HTTP URL or a local file.
    ///
    /// Absolute `http(s)` and `file` URLs are used as is. Anything else is
    /// joined onto `base_url` when one is configured, or read from disk.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if `base_url` is not a valid URL.
    pub fn resolve(config: &ClientSearchConfig) -> Result<Self, ProviderError> {
        if let Ok(url) = Url::parse(&config.index_url) {
            match url.scheme() {
                "http" | "https" => return Ok(Self::Http(url)),
                "file" => {
                    if let Ok(path) = url.to_file_path() {
                        return Ok(Self::File(path));
                    }
                }
                // Drive letters parse as schemes; treat them as paths.
                _ => {}
            }
        }

        if let Some(base) = &config.base_url {
            let base = Url::parse(base)
                .map_err(|e| ProviderError::Config(format!("invalid base_url {base}: {e}")))?;
            let url = base.join(&config.index_url).map_err(|e| {
                ProviderError::Config(format!("invalid index_url {}: {e}", config.index_url))
            })?;
            return Ok(Self::Http(url));
        }

        Ok(Self::File(expand_tilde(&config.index_url)))
    }
}

/// In-process provider backed by [`SearchEngine`] and a [`CacheLayer`].
#[derive(Debug)]
pub struct ClientSearchProvider {
    engine: SearchEngine,
    cache: CacheLayer,
    http: reqwest::Client,
    config: RwLock<Option<ClientSearchConfig>>,
}

impl ClientSearchProvider {
    pub const NAME: &'static str = "client";

    #[must_use]
    pub fn new(cache: CacheLayer) -> Self {
        Self::with_http_client(cache, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_http_client(cache: CacheLayer, http: reqwest::Client) -> Self {
        Self {
            engine: SearchEngine::new(),
            cache,
            http,
            config: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    #[must_use]
    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.config.read().is_some()
    }

    fn current_config(&self) -> ClientSearchConfig {
        self.config.read().clone().unwrap_or_default()
    }

    /// Cache first, then the network. Failures degrade to an empty index.
    async fn load_index(&self, config: &ClientSearchConfig) -> Vec<SearchIndexEntry> {
        if let Some(cached) = self.cache.load_fresh(&config.cache_key) {
            tracing::debug!(
                key = %config.cache_key,
                entries = cached.index.len(),
                "Using cached search index"
            );
            return cached.index;
        }

        match self.fetch_index(config).await {
            Ok(data) => {
                let entries = data.index.clone();
                self.cache.store(&config.cache_key, &data);
                entries
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load search index, continuing with an empty index");
                Vec::new()
            }
        }
    }

    /// Load the index from its source, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the source cannot be reached, answers with a
    /// non-success status, or does not contain a valid index.
    pub async fn fetch_index(&self, config: &ClientSearchConfig) -> Result<CacheData, ProviderError> {
        let source = IndexSource::resolve(config)?;
        let fetch_error = |message: String| ProviderError::IndexFetch {
            location: source.to_string(),
            message,
        };

        match &source {
            IndexSource::Http(url) => {
                let response = self
                    .http
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(fetch_error(format!("HTTP {status}")));
                }

                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
                let entries = deserialize_search_index(&body)?;

                Ok(CacheData::new(entries, etag))
            }
            IndexSource::File(path) => {
                let body = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;
                let entries = deserialize_search_index(&body)?;

                Ok(CacheData::new(entries, None))
            }
        }
    }
}

#[async_trait]
impl SearchProvider for ClientSearchProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<InitializeResult, ProviderError> {
        let ProviderConfig::Client(config) = config else {
            return Err(ProviderError::Config(
                "client provider requires client configuration".to_string(),
            ));
        };

        let entries = self.load_index(&config).await;
        self.engine.initialize(entries);
        *self.config.write() = Some(config);

        Ok(InitializeResult {
            index_size: self.engine.size(),
        })
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let Some(config) = self.config.read().clone() else {
            return Vec::new();
        };

        let defaults = SearchOptions {
            limit: Some(config.limit),
            offset: Some(0),
            threshold: Some(config.threshold),
        };
        self.engine.search(query, &options.or(defaults))
    }

    fn as_indexing(&self) -> Option<&dyn IndexingProvider> {
        Some(self)
    }
}

#[async_trait]
impl IndexingProvider for ClientSearchProvider {
    async fn index(&self, entries: Vec<SearchIndexEntry>) -> Result<InitializeResult, ProviderError> {
        let config = self.current_config();
        self.cache
            .store(&config.cache_key, &CacheData::new(entries.clone(), None));
        self.engine.initialize(entries);

        Ok(InitializeResult {
            index_size: self.engine.size(),
        })
    }

    async fn update_index(
        &self,
        entries: Vec<SearchIndexEntry>,
    ) -> Result<InitializeResult, ProviderError> {
        let mut merged = self.engine.entries();
        for entry in entries {
            match merged.iter_mut().find(|existing| existing.url == entry.url) {
                Some(existing) => *existing = entry,
                None => merged.push(entry),
            }
        }

        self.index(merged).await
    }
}
