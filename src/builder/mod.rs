//! Build-time index construction.
//!
//! Collects rendered HTML pages and markdown content items, turns them into
//! [`SearchIndexEntry`] values and writes `search-index.json`. A page that
//! fails to load is logged and skipped; it never aborts the build.

pub mod html;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::BuilderConfig;
use crate::index::generator::{ContentItem, GeneratorOptions, PageData, generate_search_index};
use crate::index::{IndexError, SearchIndexEntry, serialize_search_index};
use crate::text::PathFilter;

/// Errors that can occur while building an index.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Page {url} is {size} bytes (max {max})", max = html::MAX_HTML_SIZE)]
    PageTooLarge { url: String, size: usize },

    #[error("Failed to parse content manifest {path}: {source}")]
    ContentManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counts reported after a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Entries written to the index.
    pub indexed: usize,
    /// Pages dropped because they failed to load or had no content.
    pub skipped: usize,
    /// Pages and content items matching an exclude pattern.
    pub excluded: usize,
}

/// Accumulates pages and content, then produces the index.
#[derive(Debug)]
pub struct IndexBuilder {
    options: GeneratorOptions,
    output: PathBuf,
    pages: Vec<PageData>,
    content: Vec<ContentItem>,
    report: BuildReport,
}

impl IndexBuilder {
    /// Create a builder from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::InvalidPattern` if an exclude pattern does not compile.
    pub fn new(config: &BuilderConfig) -> Result<Self, BuildError> {
        let options = GeneratorOptions {
            exclude: PathFilter::new(&config.exclude_paths)?,
            max_content_length: Some(config.max_content_length).filter(|max| *max > 0),
        };

        Ok(Self {
            options,
            output: config.output.clone(),
            pages: Vec::new(),
            content: Vec::new(),
            report: BuildReport::default(),
        })
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Extract a rendered page and queue it for indexing.
    ///
    /// Returns `Ok(false)` when the page is excluded or has no content.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::PageTooLarge` for oversized documents.
    pub fn add_html_page(&mut self, url: &str, raw_html: &str) -> Result<bool, BuildError> {
        if self.options.exclude.is_excluded(url) {
            self.report.excluded += 1;
            return Ok(false);
        }

        if raw_html.len() > html::MAX_HTML_SIZE {
            return Err(BuildError::PageTooLarge {
                url: url.to_string(),
                size: raw_html.len(),
            });
        }

        let extracted = html::extract_page(raw_html);
        if extracted.content.is_empty() {
            tracing::warn!(url, "No content extracted, skipping page");
            self.report.skipped += 1;
            return Ok(false);
        }

        self.pages.push(PageData {
            url: url.to_string(),
            title: extracted.title,
            description: extracted.description,
            content: extracted.content,
            tags: Vec::new(),
        });
        Ok(true)
    }

    /// Queue a markdown content item.
    pub fn add_content(&mut self, item: ContentItem) {
        if self.options.exclude.is_excluded(&item.url) {
            self.report.excluded += 1;
            return;
        }
        self.content.push(item);
    }

    /// Walk `dir` for `*.html` files and add each as a page.
    ///
    /// Returns the number of pages accepted. Unreadable or oversized pages
    /// are logged and counted as skipped.
    pub fn scan_pages(&mut self, dir: &Path) -> usize {
        let mut added = 0;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot walk output directory");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "html") {
                continue;
            }

            let url = url_from_html_path(dir, path);
            let result = fs::read_to_string(path)
                .map_err(|source| BuildError::Read {
                    path: path.to_path_buf(),
                    source,
                })
                .and_then(|raw| self.add_html_page(&url, &raw));

            match result {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to process page");
                    self.report.skipped += 1;
                }
            }
        }

        added
    }

    /// Generate entries from everything queued so far.
    #[must_use]
    pub fn entries(&self) -> Vec<SearchIndexEntry> {
        generate_search_index(&self.pages, &self.content, &self.options)
    }

    /// Generate the index and write it to the configured output path.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write(&self) -> Result<BuildReport, BuildError> {
        let entries = self.entries();
        let json = serialize_search_index(&entries)?;

        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&self.output, json).map_err(|source| BuildError::Write {
            path: self.output.clone(),
            source,
        })?;

        let report = BuildReport {
            indexed: entries.len(),
            ..self.report
        };
        tracing::info!(
            output = %self.output.display(),
            indexed = report.indexed,
            skipped = report.skipped,
            excluded = report.excluded,
            "Search index written"
        );
        Ok(report)
    }
}

/// Read a content manifest: a JSON array of pre-rendered content items.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_content_manifest(path: &Path) -> Result<Vec<ContentItem>, BuildError> {
    let contents = fs::read_to_string(path).map_err(|source| BuildError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| BuildError::ContentManifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Map a rendered file to its URL path.
///
/// `index.html` maps to its directory, other files drop the `.html` suffix.
#[must_use]
pub fn url_from_html_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(last) = segments.pop() {
        if last != "index.html" {
            let stem = last.strip_suffix(".html").unwrap_or(&last).to_string();
            segments.push(stem);
        }
    }

    format!("/{}", segments.join("/"))
}
