//! HTTP index worker.
//!
//! Owns the persisted index and answers queries against it:
//!
//! | Route                     | Auth   | Effect                                 |
//! |---------------------------|--------|----------------------------------------|
//! | `GET /search/health`      |        | liveness plus metadata summary         |
//! | `GET /search/execute`     |        | ranked query against the stored index  |
//! | `GET /search/stats`       |        | metadata summary                       |
//! | `POST /search/index`      | bearer | append entries                         |
//! | `GET/POST /search/sync-index` | bearer | replace index from a remote file   |
//!
//! Health and stats read only the metadata record. The engine is loaded
//! lazily on the first query and reloaded when the metadata timestamp moves
//! past the last load. Concurrent queries may trigger a redundant reload,
//! which is harmless because the stored index is replaced whole.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::index::{INDEX_VERSION, SearchIndexEntry, SearchResult};
use crate::provider::cloudflare::{AppendResponse, HealthStatus, IndexStats};
use crate::search::{SearchEngine, SearchOptions};
use crate::storage::local::LocalStorageBackend;
use crate::storage::{IndexStore, StorageError};

/// Index fetched by `sync-index` when the request names none.
pub const DEFAULT_SYNC_PATH: &str = "/search-index.json";

/// Errors surfaced by worker routes.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to fetch index from {url}: {message}")]
    Upstream { url: String, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Index reload failed: {0}")]
    Reload(#[from] tokio::task::JoinError),
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::Unauthorized => StatusCode::UNAUTHORIZED,
            WorkerError::Forbidden => StatusCode::FORBIDDEN,
            WorkerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WorkerError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            WorkerError::Storage(_) | WorkerError::Reload(_) => {
                tracing::error!(error = %self, "Worker request failed");
                return internal_error();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "Worker handler panicked");
    internal_error()
}

/// Shared state behind every route.
pub struct WorkerState {
    store: IndexStore,
    engine: Arc<SearchEngine>,
    /// Timestamp of the stored index the engine was last loaded from.
    loaded_at: Mutex<Option<i64>>,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerState")
            .field("engine", &self.engine)
            .field("loaded_at", &*self.loaded_at.lock())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl WorkerState {
    /// `auth_token` of `None` rejects every authenticated request.
    #[must_use]
    pub fn new(store: IndexStore, auth_token: Option<String>) -> Self {
        Self {
            store,
            engine: Arc::new(SearchEngine::new()),
            loaded_at: Mutex::new(None),
            auth_token,
            http: reqwest::Client::new(),
        }
    }

    /// State persisted under `data_dir`: `objects/` for the index and `kv/`
    /// for metadata.
    #[must_use]
    pub fn open(data_dir: &Path, auth_token: Option<String>) -> Self {
        let store = IndexStore::new(
            Arc::new(LocalStorageBackend::new(data_dir.join("objects"))),
            Arc::new(LocalStorageBackend::new(data_dir.join("kv"))),
        );
        Self::new(store, auth_token)
    }

    #[must_use]
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Load the stored index into the engine if it is missing or stale.
    ///
    /// The engine is rebuilt on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError` if the stores cannot be read or the rebuild task
    /// fails.
    pub async fn ensure_search_index(&self) -> Result<(), WorkerError> {
        let metadata = self.store.read_metadata().await?;
        let loaded_at = *self.loaded_at.lock();

        let stale = match (loaded_at, &metadata) {
            (None, _) => true,
            (Some(at), Some(meta)) => meta.timestamp > at,
            (Some(_), None) => false,
        };
        if !stale && self.engine.is_initialized() {
            return Ok(());
        }

        let (entries, timestamp) = match self.store.read_index().await? {
            Some(data) => (data.entries, data.timestamp),
            None => (Vec::new(), metadata.map_or(0, |m| m.timestamp)),
        };
        tracing::info!(entries = entries.len(), timestamp, "Loading search index");

        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.initialize(entries)).await?;
        *self.loaded_at.lock() = Some(timestamp);
        Ok(())
    }

    /// Force a reload on the next query.
    pub fn invalidate(&self) {
        self.engine.clear();
        *self.loaded_at.lock() = None;
    }

    async fn replace_entries(
        &self,
        entries: Vec<SearchIndexEntry>,
    ) -> Result<AppendResponse, StorageError> {
        let metadata = self.store.write_entries(entries).await?;
        self.invalidate();

        Ok(AppendResponse {
            success: true,
            entries_count: metadata.entry_count,
            timestamp: metadata.timestamp,
        })
    }
}

type SharedState = Arc<WorkerState>;

/// Build the worker router with CORS, preflight and request tracing.
pub fn router(state: SharedState) -> Router {
    with_middleware(routes(state))
}

fn routes(state: SharedState) -> Router {
    let admin = Router::new()
        .route("/search/index", post(append_index))
        .route("/search/sync-index", get(sync_index).post(sync_index))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/search/health", get(health))
        .route("/search/execute", get(execute))
        .route("/search/stats", get(stats))
        .merge(admin)
        .fallback(not_found)
        .with_state(state)
}

/// Layers shared by every route: panics become 500s, OPTIONS is answered
/// directly, and every response carries the CORS headers.
fn with_middleware(routes: Router) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
}

/// Bind `listen` and serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(listen: &str, state: SharedState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(address = %listener.local_addr()?, "Search worker listening");
    axum::serve(listener, router(state)).await
}

async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(request).await
}

async fn require_auth(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, WorkerError> {
    let token = bearer_token(request.headers())?;
    match state.auth_token.as_deref() {
        Some(expected) if tokens_match(token, expected) => Ok(next.run(request).await),
        _ => Err(WorkerError::Forbidden),
    }
}

/// Compare without exiting at the first differing byte.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    let mut diff = u8::from(given.len() != expected.len());
    for (i, &b) in expected.iter().enumerate() {
        diff |= b ^ given.get(i).copied().unwrap_or(!b);
    }
    diff == 0
}

/// A missing header, or one without the Bearer scheme, is unauthenticated.
fn bearer_token(headers: &HeaderMap) -> Result<&str, WorkerError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(WorkerError::Unauthorized)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn health(State(state): State<SharedState>) -> Result<Json<HealthStatus>, WorkerError> {
    let metadata = state.store.read_metadata().await?;

    Ok(Json(HealthStatus {
        status: "healthy".to_string(),
        index_size: metadata.as_ref().map_or(0, |m| m.entry_count),
        last_update: metadata.as_ref().map(|m| m.timestamp),
        version: Some(metadata.map_or_else(|| INDEX_VERSION.to_string(), |m| m.version)),
    }))
}

async fn stats(State(state): State<SharedState>) -> Result<Json<IndexStats>, WorkerError> {
    let metadata = state.store.read_metadata().await?;

    Ok(Json(IndexStats {
        size: metadata.as_ref().map_or(0, |m| m.entry_count),
        last_update: metadata.as_ref().map(|m| m.timestamp),
        version: metadata.as_ref().map(|m| m.version.clone()),
        index_size: metadata.map_or(0, |m| m.index_size),
    }))
}

#[derive(Debug, Deserialize)]
struct ExecuteParams {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn execute(
    State(state): State<SharedState>,
    Query(params): Query<ExecuteParams>,
) -> Result<Json<Value>, WorkerError> {
    if params.q.trim().is_empty() {
        return Ok(Json(json!({ "results": [], "total": 0 })));
    }

    state.ensure_search_index().await?;
    let options = SearchOptions {
        limit: params.limit,
        offset: params.offset,
        threshold: None,
    };
    let results: Vec<SearchResult> = state.engine.search(&params.q, &options);

    Ok(Json(json!({ "total": results.len(), "results": results })))
}

#[derive(Debug, Deserialize)]
struct AppendBody {
    entries: Vec<SearchIndexEntry>,
}

/// Append without deduplication; the stored index only grows.
async fn append_index(
    State(state): State<SharedState>,
    Json(body): Json<AppendBody>,
) -> Result<Json<AppendResponse>, WorkerError> {
    let mut entries = state.store.read_entries().await?;
    let added = body.entries.len();
    entries.extend(body.entries);

    let response = state.replace_entries(entries).await?;
    tracing::info!(added, total = response.entries_count, "Appended to search index");
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncParams {
    index_url: Option<String>,
    url: Option<String>,
}

async fn sync_index(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SyncParams>,
    body: Option<Json<SyncParams>>,
) -> Result<Json<AppendResponse>, WorkerError> {
    let requested = body
        .and_then(|Json(b)| b.index_url.or(b.url))
        .or(query.index_url)
        .or(query.url);
    let url = resolve_sync_url(requested.as_deref(), &headers)?;

    let fetch_error = |message: String| WorkerError::Upstream {
        url: url.to_string(),
        message,
    };
    let response = state
        .http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }
    let body = response.text().await.map_err(|e| fetch_error(e.to_string()))?;

    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| WorkerError::BadRequest(format!("Index payload is not valid JSON: {e}")))?;
    if !payload.is_array() {
        return Err(WorkerError::BadRequest(
            "Index payload must be a JSON array".to_string(),
        ));
    }
    let entries: Vec<SearchIndexEntry> = serde_json::from_value(payload)
        .map_err(|e| WorkerError::BadRequest(format!("Invalid index entries: {e}")))?;

    let response = state.replace_entries(entries).await?;
    tracing::info!(source = %url, total = response.entries_count, "Replaced search index");
    Ok(Json(response))
}

/// Absolute urls are used as given; paths resolve against the request's host.
fn resolve_sync_url(requested: Option<&str>, headers: &HeaderMap) -> Result<Url, WorkerError> {
    let requested = requested.unwrap_or(DEFAULT_SYNC_PATH);
    if let Ok(url) = Url::parse(requested) {
        return Ok(url);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    Url::parse(&format!("http://{host}"))
        .and_then(|origin| origin.join(requested))
        .map_err(|e| WorkerError::BadRequest(format!("Invalid index url {requested}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_host(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_str(host).unwrap());
        headers
    }

    #[test]
    fn sync_url_defaults_to_request_origin() {
        let url = resolve_sync_url(None, &headers_with_host("docs.example.com")).unwrap();
        assert_eq!(url.as_str(), "http://docs.example.com/search-index.json");
    }

    #[test]
    fn sync_url_keeps_absolute_urls() {
        let url = resolve_sync_url(
            Some("https://cdn.example.com/idx.json"),
            &headers_with_host("docs.example.com"),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/idx.json");
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(WorkerError::Unauthorized)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(WorkerError::Unauthorized)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn token_comparison_checks_every_byte() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cres", "s3cret"));
        assert!(!tokens_match("s3cre", "s3cret"));
        assert!(!tokens_match("s3crets", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
        assert!(tokens_match("", ""));
    }

    #[tokio::test]
    async fn handler_panics_become_json_errors() {
        use axum::body::Body;
        use tower::ServiceExt;

        async fn explode() -> &'static str {
            panic!("handler blew up")
        }

        let app = with_middleware(Router::new().route("/boom", get(explode)));
        let response = app
            .oneshot(axum::http::Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Internal Server Error" }));
    }

    #[test]
    fn storage_errors_hide_details() {
        let response =
            WorkerError::Storage(StorageError::ReadError("disk gone".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
