//! Turns extracted page data and content items into index entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::index::SearchIndexEntry;
use crate::text::{PathFilter, extract_keywords, normalize_text, strip_html, title_from_path, truncate_content};

/// Text extracted from a rendered HTML page.
#[derive(Debug, Clone, Default)]
pub struct PageData {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Plain text of the page's main content region.
    pub content: String,
    pub tags: Vec<String>,
}

/// Front-matter fields the index cares about. Other keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A markdown content file, already rendered to HTML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub url: String,
    #[serde(default)]
    pub meta: ContentMeta,
    #[serde(default)]
    pub html: String,
}

/// Options shared by every generated entry.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    pub exclude: PathFilter,
    /// Truncate `content` to this many characters.
    pub max_content_length: Option<usize>,
}

impl GeneratorOptions {
    fn finish_content(&self, text: &str) -> String {
        match self.max_content_length {
            Some(max) if max > 0 => truncate_content(text, max),
            _ => text.to_string(),
        }
    }
}

/// Build the entry for a rendered page.
///
/// Returns `None` when the page has no content after normalization.
#[must_use]
pub fn entry_from_page(page: &PageData, options: &GeneratorOptions) -> Option<SearchIndexEntry> {
    let content = normalize_text(&page.content);
    if content.is_empty() {
        return None;
    }

    let title = non_empty(page.title.as_deref()).unwrap_or_else(|| title_from_path(&page.url));
    let description = non_empty(page.description.as_deref()).unwrap_or_default();
    let keywords = extract_keywords(&title, &description);

    Some(SearchIndexEntry {
        url: page.url.clone(),
        title,
        description,
        content: options.finish_content(&content),
        tags: page.tags.clone(),
        keywords,
    })
}

/// Build the entry for a markdown content item.
#[must_use]
pub fn entry_from_content(item: &ContentItem, options: &GeneratorOptions) -> SearchIndexEntry {
    let title = non_empty(item.meta.title.as_deref()).unwrap_or_else(|| title_from_path(&item.url));
    let description = non_empty(item.meta.description.as_deref()).unwrap_or_default();
    let content = strip_html(&item.html);
    let keywords = extract_keywords(&title, &description);

    SearchIndexEntry {
        url: item.url.clone(),
        title,
        description,
        content: options.finish_content(&content),
        tags: item.meta.tags.clone(),
        keywords,
    }
}

/// Generate index entries, pages first and then content items.
///
/// Excluded paths and empty pages are skipped. When two inputs share a URL
/// the first one wins.
#[must_use]
pub fn generate_search_index(
    pages: &[PageData],
    content: &[ContentItem],
    options: &GeneratorOptions,
) -> Vec<SearchIndexEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(pages.len() + content.len());

    let page_entries = pages.iter().filter_map(|page| {
        if options.exclude.is_excluded(&page.url) {
            tracing::debug!(url = %page.url, "Excluded page");
            return None;
        }
        let entry = entry_from_page(page, options);
        if entry.is_none() {
            tracing::warn!(url = %page.url, "Skipping page without content");
        }
        entry
    });

    let content_entries = content.iter().filter_map(|item| {
        if options.exclude.is_excluded(&item.url) {
            tracing::debug!(url = %item.url, "Excluded content");
            return None;
        }
        Some(entry_from_content(item, options))
    });

    for entry in page_entries.chain(content_entries) {
        if seen.insert(entry.url.clone()) {
            entries.push(entry);
        } else {
            tracing::warn!(url = %entry.url, "Duplicate URL, keeping first entry");
        }
    }

    entries
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: Option<&str>, content: &str) -> PageData {
        PageData {
            url: url.to_string(),
            title: title.map(str::to_string),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn page_title_falls_back_to_path() {
        let entry = entry_from_page(
            &page("/guides/quick-start", None, "Body"),
            &GeneratorOptions::default(),
        )
        .unwrap();
        assert_eq!(entry.title, "Quick Start");
        assert_eq!(entry.keywords, vec!["quick", "start"]);
    }

    #[test]
    fn empty_page_is_skipped() {
        assert!(entry_from_page(&page("/x", Some("X"), "   \n "), &GeneratorOptions::default()).is_none());
    }

    #[test]
    fn content_item_uses_front_matter() {
        let item = ContentItem {
            url: "/docs/deep-dive".to_string(),
            meta: ContentMeta {
                title: Some("Deep Dive".to_string()),
                description: None,
                tags: vec!["advanced".to_string()],
            },
            html: "<h1>Deep</h1><p>Internals &amp; more</p>".to_string(),
        };
        let entry = entry_from_content(&item, &GeneratorOptions::default());
        assert_eq!(entry.title, "Deep Dive");
        assert_eq!(entry.description, "");
        assert_eq!(entry.content, "Deep Internals & more");
        assert_eq!(entry.tags, vec!["advanced"]);
    }

    #[test]
    fn truncation_applies_to_content() {
        let options = GeneratorOptions {
            max_content_length: Some(10),
            ..Default::default()
        };
        let entry = entry_from_page(&page("/a", Some("A"), "alpha beta gamma delta"), &options).unwrap();
        assert_eq!(entry.content, "alpha...");
    }

    #[test]
    fn exclusion_and_duplicates() {
        let options = GeneratorOptions {
            exclude: PathFilter::new(&["/admin/*"]).unwrap(),
            ..Default::default()
        };
        let pages = vec![
            page("/", Some("Home"), "Welcome"),
            page("/admin/users", Some("Users"), "Secret"),
            page("/", Some("Again"), "Duplicate"),
        ];
        let content = vec![ContentItem {
            url: "/admin/notes".to_string(),
            ..Default::default()
        }];

        let entries = generate_search_index(&pages, &content, &options);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Home");
    }
}
