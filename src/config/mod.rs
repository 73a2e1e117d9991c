//! Configuration loading for duct-search.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "DUCT_SEARCH_CONFIG";

/// Environment variable holding the worker's pre-shared admin token.
pub const AUTH_TOKEN_ENV: &str = "DUCT_SEARCH_AUTH_TOKEN";

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub client: ClientSearchConfig,
    #[serde(default)]
    pub cloudflare: CloudflareSearchConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Index builder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuilderConfig {
    pub output: PathBuf,
    pub exclude_paths: Vec<String>,
    /// Maximum characters of content per entry; 0 disables truncation.
    pub max_content_length: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("search-index.json"),
            exclude_paths: Vec::new(),
            max_content_length: 5000,
        }
    }
}

/// Client search provider settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientSearchConfig {
    /// Absolute URL, URL path relative to `base_url`, or local file path.
    pub index_url: String,
    pub base_url: Option<String>,
    pub cache_key: String,
    pub threshold: f64,
    pub limit: usize,
    /// Directory holding the index cache. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientSearchConfig {
    fn default() -> Self {
        Self {
            index_url: "/search-index.json".to_string(),
            base_url: None,
            cache_key: "duct-search-index".to_string(),
            threshold: 0.3,
            limit: 10,
            cache_dir: None,
        }
    }
}

/// Cloudflare worker provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CloudflareSearchConfig {
    pub worker_url: String,
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout: u64,
}

impl Default for CloudflareSearchConfig {
    fn default() -> Self {
        Self {
            worker_url: String::new(),
            api_key: None,
            timeout: 5000,
        }
    }
}

/// Index worker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WorkerConfig {
    pub listen: String,
    pub data_dir: Option<PathBuf>,
    pub auth_token: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
            data_dir: None,
            auth_token: None,
        }
    }
}

impl WorkerConfig {
    /// The admin token from config, or from the environment.
    #[must_use]
    pub fn resolve_auth_token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
    }

    /// Storage directory for the worker's index and metadata.
    #[must_use]
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("worker")))
            .unwrap_or_else(|| PathBuf::from(".duct-search/worker"))
    }
}

impl ClientSearchConfig {
    /// Cache directory for the client provider.
    #[must_use]
    pub fn resolve_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .as_deref()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .or_else(|| project_dirs().map(|dirs| dirs.cache_dir().to_path_buf()))
    }
}

impl Config {
    /// Load config from `$DUCT_SEARCH_CONFIG` or
    /// ~/.config/duct-search/config.toml, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if let Some(path) = config_path
            && path.exists()
        {
            let contents = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
            return Ok(config);
        }

        Ok(Config::default())
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(expand_tilde(&path));
        }
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "duct-search")
}

/// Expand ~ to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(base_dirs) = BaseDirs::new()
    {
        return base_dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}
