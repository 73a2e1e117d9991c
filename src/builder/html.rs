//! Heuristic extraction of title, description and main content from
//! rendered HTML pages.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::text::{normalize_text, strip_html};

/// Pages larger than this are rejected rather than parsed (10 MB).
pub const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

fn selectors(sources: &[&str]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|css| {
            Selector::parse(css)
                .inspect_err(|e| tracing::error!(selector = css, error = %e, "Invalid selector"))
                .ok()
        })
        .collect()
}

const CONTENT_SOURCES: [&str; 6] = [
    "article",
    "main",
    "[role=\"main\"]",
    "[class*=\"content\"]",
    "#content",
    "body",
];

const META_TITLE_SOURCES: [&str; 2] = [
    "meta[property=\"og:title\"], meta[name=\"og:title\"]",
    "meta[name=\"title\"]",
];

const META_DESCRIPTION_SOURCES: [&str; 3] = [
    "meta[name=\"description\"]",
    "meta[property=\"og:description\"], meta[name=\"og:description\"]",
    "meta[name=\"twitter:description\"], meta[property=\"twitter:description\"]",
];

/// Main-content candidates, most specific first.
static CONTENT_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&CONTENT_SOURCES));

/// Elements whose text is the title: `<title>`, then the first `<h1>`.
static TEXT_TITLE_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&["title", "h1"]));

/// `<meta>` selectors for the title, in priority order.
static META_TITLE_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&META_TITLE_SOURCES));

/// `<meta>` selectors for the description, in priority order.
static META_DESCRIPTION_SELECTORS: LazyLock<Vec<Selector>> =
    LazyLock::new(|| selectors(&META_DESCRIPTION_SOURCES));

/// Fields pulled out of one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Plain text; empty when the page has nothing indexable.
    pub content: String,
}

/// Extract title, description and main content from an HTML document.
#[must_use]
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        content: extract_main_content(&document, html),
    }
}

/// The first candidate region with text wins; otherwise the whole document
/// is stripped.
fn extract_main_content(document: &Html, raw: &str) -> String {
    for sel in CONTENT_SELECTORS.iter() {
        if let Some(element) = document.select(sel).next() {
            let text = strip_html(&element.inner_html());
            if !text.is_empty() {
                return text;
            }
        }
    }

    strip_html(raw)
}

fn extract_title(document: &Html) -> Option<String> {
    let from_text = TEXT_TITLE_SELECTORS.iter().find_map(|sel| {
        document
            .select(sel)
            .next()
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    from_text.or_else(|| first_meta_content(document, &META_TITLE_SELECTORS))
}

fn extract_description(document: &Html) -> Option<String> {
    first_meta_content(document, &META_DESCRIPTION_SELECTORS)
}

fn first_meta_content(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        document
            .select(sel)
            .filter_map(|el| el.value().attr("content"))
            .map(normalize_text)
            .find(|c| !c.is_empty())
    })
}
