//! HTTP client for a deployed index worker.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::CloudflareSearchConfig;
use crate::index::{SearchIndexEntry, SearchResult};
use crate::provider::{InitializeResult, ProviderConfig, ProviderError, SearchProvider};
use crate::search::SearchOptions;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// `GET /search/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub index_size: usize,
    #[serde(default)]
    pub last_update: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
}

/// `GET /search/stats` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub size: usize,
    pub last_update: Option<i64>,
    pub version: Option<String>,
    /// Serialized index size in bytes.
    pub index_size: usize,
}

/// Credentials for publishing entries, separate from the query-time api key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendConfig {
    pub worker_url: String,
    pub auth_token: String,
    /// Milliseconds; `None` uses [`DEFAULT_TIMEOUT_MS`].
    pub timeout: Option<u64>,
}

/// Response of the index-writing routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    pub success: bool,
    pub entries_count: usize,
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

/// A worker hit before validation; url and title are required.
#[derive(Deserialize)]
struct RawResult {
    url: Option<String>,
    title: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl RawResult {
    fn into_result(self) -> Option<SearchResult> {
        Some(SearchResult {
            url: self.url.filter(|u| !u.is_empty())?,
            title: self.title.filter(|t| !t.is_empty())?,
            excerpt: self.excerpt.unwrap_or_default(),
            score: self.score,
        })
    }
}

#[derive(Serialize)]
struct AppendRequest<'a> {
    entries: &'a [SearchIndexEntry],
}

/// Search provider that forwards queries to an index worker.
#[derive(Debug)]
pub struct CloudflareSearchProvider {
    http: reqwest::Client,
    config: RwLock<Option<CloudflareSearchConfig>>,
}

impl Default for CloudflareSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudflareSearchProvider {
    pub const NAME: &'static str = "cloudflare";

    #[must_use]
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    #[must_use]
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self {
            http,
            config: RwLock::new(None),
        }
    }

    fn require_config(&self) -> Result<CloudflareSearchConfig, ProviderError> {
        self.config.read().clone().ok_or_else(|| {
            ProviderError::Config("cloudflare provider is not initialized".to_string())
        })
    }

    /// Run a query against `/search/execute`, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Timeout` when the worker does not answer in
    /// time, and other variants for transport, status or decoding failures.
    pub async fn try_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let config = self.require_config()?;

        let mut params = vec![("q", query.to_string())];
        if let Some(limit) = options.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = options.offset {
            params.push(("offset", offset.to_string()));
        }

        let mut request = self
            .http
            .get(endpoint(&config.worker_url, "/search/execute"))
            .query(&params);
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let body: ExecuteResponse = send_json(request, config.timeout).await?;
        Ok(body
            .results
            .into_iter()
            .filter_map(RawResult::into_result)
            .collect())
    }

    /// Fetch `/search/stats` from the configured worker.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the provider is not initialized or the
    /// request fails.
    pub async fn get_index_stats(&self) -> Result<IndexStats, ProviderError> {
        let config = self.require_config()?;
        fetch_stats(&self.http, &config.worker_url, config.timeout).await
    }

    /// Publish `entries` to the worker, appending to its persisted index.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` when the worker url or token is empty,
    /// and `ProviderError::Http` when the worker rejects the request.
    pub async fn append_index(
        &self,
        entries: &[SearchIndexEntry],
        append: &AppendConfig,
    ) -> Result<AppendResponse, ProviderError> {
        append_index(&self.http, entries, append).await
    }
}

#[async_trait]
impl SearchProvider for CloudflareSearchProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<InitializeResult, ProviderError> {
        let ProviderConfig::Cloudflare(config) = config else {
            return Err(ProviderError::Config(
                "cloudflare provider requires cloudflare configuration".to_string(),
            ));
        };
        if config.worker_url.trim().is_empty() {
            return Err(ProviderError::Config("workerUrl is required".to_string()));
        }

        let url = endpoint(&config.worker_url, "/search/health");
        let health: HealthStatus = send_json(self.http.get(&url), config.timeout)
            .await
            .map_err(|e| ProviderError::Connection {
                url: config.worker_url.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            worker = %config.worker_url,
            index_size = health.index_size,
            "Connected to search worker"
        );
        *self.config.write() = Some(config);

        Ok(InitializeResult {
            index_size: health.index_size,
        })
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        if self.config.read().is_none() {
            return Vec::new();
        }

        self.try_search(query, options).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Remote search failed");
            Vec::new()
        })
    }
}

/// Fetch `/search/stats` from `worker_url`.
///
/// # Errors
///
/// Returns `ProviderError` if the request fails or times out.
pub async fn fetch_stats(
    http: &reqwest::Client,
    worker_url: &str,
    timeout_ms: u64,
) -> Result<IndexStats, ProviderError> {
    send_json(http.get(endpoint(worker_url, "/search/stats")), timeout_ms).await
}

/// POST `entries` to `/search/index` with the append credentials.
///
/// # Errors
///
/// Returns `ProviderError::Config` when the worker url or token is empty,
/// and `ProviderError::Http` when the worker rejects the request.
pub async fn append_index(
    http: &reqwest::Client,
    entries: &[SearchIndexEntry],
    append: &AppendConfig,
) -> Result<AppendResponse, ProviderError> {
    if append.worker_url.trim().is_empty() {
        return Err(ProviderError::Config("workerUrl is required".to_string()));
    }
    if append.auth_token.is_empty() {
        return Err(ProviderError::Config(
            "authToken is required to append to the index".to_string(),
        ));
    }

    let request = http
        .post(endpoint(&append.worker_url, "/search/index"))
        .bearer_auth(&append.auth_token)
        .json(&AppendRequest { entries });

    let response: AppendResponse =
        send_json(request, append.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)).await?;
    tracing::info!(entries = response.entries_count, "Appended entries to search worker");
    Ok(response)
}

fn endpoint(worker_url: &str, path: &str) -> String {
    format!("{}{path}", worker_url.trim_end_matches('/'))
}

/// Send `request` and decode a JSON body, bounded by `timeout_ms`.
///
/// Elapsing drops the in-flight request future, which aborts the request.
async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout_ms: u64,
) -> Result<T, ProviderError> {
    let response = with_timeout(timeout_ms, request.send()).await??;
    let response = check_status(response).await?;
    let body = with_timeout(timeout_ms, response.text()).await??;

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

async fn with_timeout<F: Future>(timeout_ms: u64, future: F) -> Result<F::Output, ProviderError> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), future)
        .await
        .map_err(|_| ProviderError::Timeout(timeout_ms))
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
    })
}
