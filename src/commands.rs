//! Command implementations behind the CLI.
//!
//! Each command takes the loaded [`Config`] plus its flag overrides and
//! returns data; printing is left to the binary.

use std::path::{Path, PathBuf};
#[cfg(feature = "worker")]
use std::sync::Arc;

use anyhow::Context;

use crate::builder::{BuildReport, IndexBuilder, load_content_manifest};
use crate::cache::CacheLayer;
use crate::config::{BuilderConfig, ClientSearchConfig, CloudflareSearchConfig, Config};
use crate::index::{SearchResult, deserialize_search_index};
use crate::provider::cloudflare::{AppendResponse, IndexStats, fetch_stats};
use crate::provider::{
    AppendConfig, ClientSearchProvider, CloudflareSearchProvider, ProviderConfig, SearchProvider,
};
use crate::search::SearchOptions;

/// Flag overrides for `build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub pages: Option<PathBuf>,
    pub content: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub max_content_length: Option<usize>,
}

impl BuildOptions {
    /// Flags win over config; exclude patterns are added to the configured ones.
    fn apply(&self, config: &BuilderConfig) -> BuilderConfig {
        let mut config = config.clone();
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        config.exclude_paths.extend(self.exclude.iter().cloned());
        if let Some(max) = self.max_content_length {
            config.max_content_length = max;
        }
        config
    }
}

/// Build the index from rendered pages and a content manifest.
///
/// # Errors
///
/// Returns an error if neither source is given, an exclude pattern is
/// invalid, the manifest cannot be read, or the output cannot be written.
pub fn build(config: &Config, options: &BuildOptions) -> anyhow::Result<BuildReport> {
    if options.pages.is_none() && options.content.is_none() {
        anyhow::bail!("Nothing to index: pass --pages and/or --content");
    }

    let mut builder = IndexBuilder::new(&options.apply(&config.builder))?;

    if let Some(pages) = &options.pages {
        if !pages.is_dir() {
            anyhow::bail!("Pages directory not found: {}", pages.display());
        }
        let added = builder.scan_pages(pages);
        tracing::debug!(added, dir = %pages.display(), "Scanned pages");
    }

    if let Some(manifest) = &options.content {
        for item in load_content_manifest(manifest)? {
            builder.add_content(item);
        }
    }

    Ok(builder.write()?)
}

/// Flag overrides for `search`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub index: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub threshold: Option<f64>,
}

/// Search with the client provider, cache first.
///
/// # Errors
///
/// Returns an error if the provider rejects its configuration. A missing or
/// unreadable index is not an error: it yields no results.
pub async fn search(
    config: &Config,
    query: &str,
    args: &SearchArgs,
) -> anyhow::Result<Vec<SearchResult>> {
    let mut client: ClientSearchConfig = config.client.clone();
    if let Some(index) = &args.index {
        client.index_url.clone_from(index);
    }

    let cache = CacheLayer::detect(client.resolve_cache_dir().as_deref());
    let provider = ClientSearchProvider::new(cache);
    let init = provider.initialize(ProviderConfig::Client(client)).await?;
    tracing::debug!(index_size = init.index_size, "Client provider ready");

    let options = SearchOptions {
        limit: args.limit,
        offset: args.offset,
        threshold: args.threshold,
    };
    Ok(provider.search(query, &options).await)
}

/// Run the index worker until interrupted.
///
/// # Errors
///
/// Returns an error if the listen address cannot be bound.
#[cfg(feature = "worker")]
pub async fn serve(
    config: &Config,
    listen: Option<String>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    use crate::worker::{self, WorkerState};

    let mut settings = config.worker.clone();
    if let Some(dir) = data_dir {
        settings.data_dir = Some(dir);
    }
    let listen = listen.unwrap_or_else(|| settings.listen.clone());
    let data_dir = settings.resolve_data_dir();

    let token = settings.resolve_auth_token();
    if token.is_none() {
        tracing::warn!("No auth token configured; index writes will be refused");
    }
    tracing::info!(data_dir = %data_dir.display(), "Opening worker storage");

    let state = Arc::new(WorkerState::open(&data_dir, token));
    worker::serve(&listen, state)
        .await
        .with_context(|| format!("Search worker failed on {listen}"))
}

fn cloudflare_config(config: &Config, worker_url: Option<String>) -> CloudflareSearchConfig {
    let mut cloudflare = config.cloudflare.clone();
    if let Some(url) = worker_url {
        cloudflare.worker_url = url;
    }
    cloudflare
}

/// Query a deployed worker.
///
/// # Errors
///
/// Returns an error if the worker is unreachable, times out or answers
/// with an error.
pub async fn remote_search(
    config: &Config,
    worker_url: Option<String>,
    query: &str,
    options: &SearchOptions,
) -> anyhow::Result<Vec<SearchResult>> {
    let provider = CloudflareSearchProvider::new();
    provider
        .initialize(ProviderConfig::Cloudflare(cloudflare_config(config, worker_url)))
        .await?;
    Ok(provider.try_search(query, options).await?)
}

/// Fetch index statistics from a deployed worker.
///
/// # Errors
///
/// Returns an error if no worker URL is configured or the request fails.
pub async fn remote_stats(config: &Config, worker_url: Option<String>) -> anyhow::Result<IndexStats> {
    let cloudflare = cloudflare_config(config, worker_url);
    if cloudflare.worker_url.trim().is_empty() {
        anyhow::bail!("No worker URL: set [cloudflare].worker_url or pass --worker-url");
    }
    Ok(fetch_stats(&reqwest::Client::new(), &cloudflare.worker_url, cloudflare.timeout).await?)
}

/// Append the entries of a local index file to a deployed worker.
///
/// # Errors
///
/// Returns an error if the file cannot be read, no token is available, or
/// the worker rejects the request.
pub async fn remote_append(
    config: &Config,
    worker_url: Option<String>,
    index: &Path,
    token: Option<String>,
) -> anyhow::Result<AppendResponse> {
    let cloudflare = cloudflare_config(config, worker_url);
    let raw = std::fs::read_to_string(index)
        .with_context(|| format!("Failed to read {}", index.display()))?;
    let entries = deserialize_search_index(&raw)?;

    let append = AppendConfig {
        worker_url: cloudflare.worker_url,
        auth_token: token
            .or_else(|| config.worker.resolve_auth_token())
            .unwrap_or_default(),
        timeout: Some(cloudflare.timeout),
    };

    let provider = CloudflareSearchProvider::new();
    Ok(provider.append_index(&entries, &append).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_override_builder_config() {
        let config = BuilderConfig {
            exclude_paths: vec!["/drafts".to_string()],
            ..Default::default()
        };
        let options = BuildOptions {
            output: Some(PathBuf::from("out/idx.json")),
            exclude: vec!["/admin/*".to_string()],
            max_content_length: Some(0),
            ..Default::default()
        };

        let merged = options.apply(&config);
        assert_eq!(merged.output, PathBuf::from("out/idx.json"));
        assert_eq!(merged.exclude_paths, vec!["/drafts", "/admin/*"]);
        assert_eq!(merged.max_content_length, 0);
    }

    #[test]
    fn build_without_sources_fails() {
        let err = build(&Config::default(), &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Nothing to index"));
    }

    #[test]
    fn build_writes_pages() {
        let temp = TempDir::new().unwrap();
        let pages = temp.path().join("dist");
        std::fs::create_dir_all(pages.join("guide")).unwrap();
        std::fs::write(
            pages.join("guide/index.html"),
            "<html><head><title>Guide</title></head><body><main>Install the widget</main></body></html>",
        )
        .unwrap();

        let output = temp.path().join("search-index.json");
        let report = build(
            &Config::default(),
            &BuildOptions {
                pages: Some(pages),
                output: Some(output.clone()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.indexed, 1);
        let entries = deserialize_search_index(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(entries[0].url, "/guide");
        assert_eq!(entries[0].title, "Guide");
    }

    #[tokio::test]
    async fn remote_stats_requires_worker_url() {
        let err = remote_stats(&Config::default(), None).await.unwrap_err();
        assert!(err.to_string().contains("No worker URL"));
    }
}
