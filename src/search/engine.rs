//! In-memory multi-field search engine with heuristic relevance ranking.
//!
//! Each of `title`, `tags`, `description` and `content` has its own inverted
//! index. Title, tags and description are indexed with every token prefix up
//! to [`MAX_PREFIX_CHARS`] characters so partial words match; content is
//! indexed by whole tokens only. Whole tokens always match at any length.
//!
//! The current index is an immutable snapshot behind a lock. Queries clone the
//! snapshot pointer and score without holding the lock, so `initialize` and
//! `clear` never race an in-flight search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::index::{SearchIndexEntry, SearchResult};
use crate::search::{DEFAULT_LIMIT, DEFAULT_THRESHOLD, SearchOptions, generate_excerpt};

/// Longest prefix indexed for a token. Longer partial queries only match
/// the whole token.
pub const MAX_PREFIX_CHARS: usize = 32;

/// Points per query term found in a field.
const TITLE_TERM_SCORE: f64 = 10.0;
const TAG_TERM_SCORE: f64 = 8.0;
const DESCRIPTION_TERM_SCORE: f64 = 5.0;
const CONTENT_TERM_SCORE: f64 = 1.0;

/// Bonus when the whole query appears verbatim.
const TITLE_PHRASE_BONUS: f64 = 20.0;
const DESCRIPTION_PHRASE_BONUS: f64 = 10.0;

/// Internal consistency failures. Never surfaced from [`SearchEngine::search`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Index references unknown document {0}")]
    MissingDocument(String),
}

/// Indexed fields, in the order they are probed for hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Tags,
    Description,
    Content,
}

impl Field {
    /// A document is attributed to the first field it matched in, so the
    /// order doubles as a preference for the strongest multiplier.
    const PROBE_ORDER: [Field; 4] = [Field::Title, Field::Tags, Field::Description, Field::Content];

    fn slot(self) -> usize {
        match self {
            Field::Title => 0,
            Field::Tags => 1,
            Field::Description => 2,
            Field::Content => 3,
        }
    }

    fn indexes_prefixes(self) -> bool {
        !matches!(self, Field::Content)
    }

    fn multiplier(self) -> f64 {
        match self {
            Field::Title => 2.0,
            Field::Tags => 1.5,
            Field::Description | Field::Content => 1.0,
        }
    }
}

/// Token → ascending document ids for one field.
#[derive(Debug, Default)]
struct FieldIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl FieldIndex {
    fn add(&mut self, doc: usize, text: &str, prefixes: bool) {
        for token in tokenize(text) {
            if prefixes {
                let mut prefix = String::with_capacity(token.len());
                for c in token.chars().take(MAX_PREFIX_CHARS) {
                    prefix.push(c);
                    self.insert(prefix.clone(), doc);
                }
            }
            self.insert(token, doc);
        }
    }

    fn insert(&mut self, token: String, doc: usize) {
        let docs = self.postings.entry(token).or_default();
        // Documents are added in ascending order, so only the tail can repeat.
        if docs.last() != Some(&doc) {
            docs.push(doc);
        }
    }

    /// Documents containing every term.
    fn lookup(&self, terms: &[String]) -> Vec<usize> {
        let mut lists = Vec::with_capacity(terms.len());
        for term in terms {
            match self.postings.get(term) {
                Some(docs) => lists.push(docs),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(|docs| docs.len());

        let Some((shortest, rest)) = lists.split_first() else {
            return Vec::new();
        };
        shortest
            .iter()
            .copied()
            .filter(|doc| rest.iter().all(|docs| docs.binary_search(doc).is_ok()))
            .collect()
    }
}

/// One immutable generation of the index.
#[derive(Debug, Default)]
struct IndexSnapshot {
    /// Document id → url.
    ids: Vec<String>,
    /// url → entry.
    lookup: HashMap<String, SearchIndexEntry>,
    fields: [FieldIndex; 4],
}

impl IndexSnapshot {
    fn build(entries: Vec<SearchIndexEntry>) -> Self {
        let mut snapshot = Self::default();

        for entry in entries {
            if snapshot.lookup.contains_key(&entry.url) {
                tracing::warn!(url = %entry.url, "Duplicate URL in index, keeping first entry");
                continue;
            }

            let doc = snapshot.ids.len();
            let tags = entry.tags.join(" ");
            for field in Field::PROBE_ORDER {
                let text = match field {
                    Field::Title => entry.title.as_str(),
                    Field::Tags => tags.as_str(),
                    Field::Description => entry.description.as_str(),
                    Field::Content => entry.content.as_str(),
                };
                snapshot.fields[field.slot()].add(doc, text, field.indexes_prefixes());
            }

            snapshot.ids.push(entry.url.clone());
            snapshot.lookup.insert(entry.url.clone(), entry);
        }

        snapshot
    }

    fn entry(&self, doc: usize) -> Result<&SearchIndexEntry, EngineError> {
        let url = self
            .ids
            .get(doc)
            .ok_or_else(|| EngineError::MissingDocument(format!("#{doc}")))?;
        self.lookup
            .get(url)
            .ok_or_else(|| EngineError::MissingDocument(url.clone()))
    }
}

/// Multi-field full-text engine.
#[derive(Debug)]
pub struct SearchEngine {
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    threshold: f64,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// Create an engine keeping results scoring at least `threshold` × the
    /// top score of each query.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            snapshot: RwLock::new(None),
            threshold,
        }
    }

    /// Replace the index with one built from `entries`.
    ///
    /// An empty list yields an initialized, empty index.
    pub fn initialize(&self, entries: Vec<SearchIndexEntry>) {
        let snapshot = Arc::new(IndexSnapshot::build(entries));
        tracing::debug!(entries = snapshot.ids.len(), "Search index initialized");
        *self.snapshot.write() = Some(snapshot);
    }

    /// Drop the index and lookup map.
    pub fn clear(&self) {
        *self.snapshot.write() = None;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.snapshot.read().as_ref().map_or(0, |s| s.ids.len())
    }

    /// Fetch an indexed entry by url.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<SearchIndexEntry> {
        let snapshot = self.snapshot.read().clone()?;
        snapshot.lookup.get(url).cloned()
    }

    /// All indexed entries, in index order.
    #[must_use]
    pub fn entries(&self) -> Vec<SearchIndexEntry> {
        let Some(snapshot) = self.snapshot.read().clone() else {
            return Vec::new();
        };
        snapshot
            .ids
            .iter()
            .filter_map(|url| snapshot.lookup.get(url).cloned())
            .collect()
    }

    /// Run a ranked query.
    ///
    /// Never fails: a blank query, an uninitialized index, or an internal
    /// error all produce an empty list.
    #[must_use]
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let Some(snapshot) = self.snapshot.read().clone() else {
            return Vec::new();
        };

        match self.search_snapshot(&snapshot, query, options) {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(query, error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    fn search_snapshot(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, EngineError> {
        let terms = query_tokens(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for field in Field::PROBE_ORDER {
            for doc in snapshot.fields[field.slot()].lookup(&terms) {
                if seen.insert(doc) {
                    hits.push((doc, field));
                }
            }
        }

        let query = query.trim();
        let query_lower = query.to_lowercase();
        let score_terms: Vec<&str> = query_lower.split_whitespace().collect();

        let mut scored = hits
            .into_iter()
            .map(|(doc, field)| -> Result<_, EngineError> {
                let entry = snapshot.entry(doc)?;
                Ok((entry, score_entry(entry, &score_terms, &query_lower, field)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let top = scored.iter().map(|(_, score)| *score).fold(0.0_f64, f64::max);
        let threshold = options.threshold.unwrap_or(self.threshold);
        scored.retain(|(_, score)| *score >= top * threshold);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let offset = options.offset.unwrap_or(0);
        let limit = options.limit.unwrap_or(DEFAULT_LIMIT);

        Ok(scored
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(entry, score)| SearchResult {
                url: entry.url.clone(),
                title: entry.title.clone(),
                excerpt: generate_excerpt(entry, query),
                score: Some(score),
            })
            .collect())
    }
}

/// Heuristic relevance of `entry` for a query.
///
/// Each whitespace-separated term earns points for every field containing it
/// as a substring, the whole query earns a phrase bonus in title or
/// description, and the total is scaled by the field the hit came from.
fn score_entry(entry: &SearchIndexEntry, terms: &[&str], query: &str, field: Field) -> f64 {
    let title = entry.title.to_lowercase();
    let description = entry.description.to_lowercase();
    let content = entry.content.to_lowercase();
    let tags = entry.tags.join(" ").to_lowercase();

    let mut score = 0.0;
    for term in terms {
        if title.contains(term) {
            score += TITLE_TERM_SCORE;
        }
        if tags.contains(term) {
            score += TAG_TERM_SCORE;
        }
        if description.contains(term) {
            score += DESCRIPTION_TERM_SCORE;
        }
        if content.contains(term) {
            score += CONTENT_TERM_SCORE;
        }
    }

    if title.contains(query) {
        score += TITLE_PHRASE_BONUS;
    }
    if description.contains(query) {
        score += DESCRIPTION_PHRASE_BONUS;
    }

    score * field.multiplier()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Distinct lower-cased query tokens, in query order.
fn query_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query).filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, title: &str, description: &str, content: &str, tags: &[&str]) -> SearchIndexEntry {
        SearchIndexEntry {
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            keywords: vec![],
        }
    }

    #[test]
    fn title_prefix_matches_but_content_needs_whole_words() {
        let engine = SearchEngine::with_threshold(0.0);
        engine.initialize(vec![
            entry("/a", "Widgets", "", "nothing", &[]),
            entry("/b", "Other", "", "widgets everywhere", &[]),
        ]);

        let results = engine.search("widg", &SearchOptions::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "/a");
    }

    #[test]
    fn long_tokens_index_bounded_prefixes() {
        let long = "x".repeat(100);
        let engine = SearchEngine::with_threshold(0.0);
        engine.initialize(vec![entry("/long", &long, "", "", &[])]);

        let snapshot = engine.snapshot.read().clone().unwrap();
        assert_eq!(snapshot.fields[Field::Title.slot()].postings.len(), MAX_PREFIX_CHARS + 1);

        let options = SearchOptions::default();
        assert_eq!(engine.search(&long, &options).len(), 1);
        assert_eq!(engine.search(&long[..10], &options).len(), 1);
        assert_eq!(engine.search(&long[..MAX_PREFIX_CHARS], &options).len(), 1);
        assert!(engine.search(&long[..40], &options).is_empty());
    }

    #[test]
    fn score_follows_field_weights() {
        let rust_title = entry("/t", "Rust", "", "", &[]);
        // term 10 + phrase 20, doubled for a title hit
        assert!((score_entry(&rust_title, &["rust"], "rust", Field::Title) - 60.0).abs() < 1e-9);

        let tagged = entry("/g", "Other", "", "", &["rust"]);
        assert!((score_entry(&tagged, &["rust"], "rust", Field::Tags) - 12.0).abs() < 1e-9);

        let described = entry("/d", "Other", "All about rust", "rust", &[]);
        // description 5 + content 1 + phrase 10
        assert!(
            (score_entry(&described, &["rust"], "rust", Field::Description) - 16.0).abs() < 1e-9
        );
    }

    #[test]
    fn multi_term_queries_need_every_term_in_one_field() {
        let engine = SearchEngine::with_threshold(0.0);
        engine.initialize(vec![
            entry("/both", "Rust async guide", "", "", &[]),
            entry("/split", "Rust", "", "async", &[]),
        ]);

        let results = engine.search("rust async", &SearchOptions::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "/both");
    }

    #[test]
    fn duplicate_urls_keep_first() {
        let engine = SearchEngine::new();
        engine.initialize(vec![
            entry("/a", "First", "", "x", &[]),
            entry("/a", "Second", "", "x", &[]),
        ]);
        assert_eq!(engine.size(), 1);
        assert_eq!(engine.get("/a").unwrap().title, "First");
    }

    #[test]
    fn punctuation_only_query_is_empty() {
        let engine = SearchEngine::new();
        engine.initialize(vec![entry("/a", "A", "", "x", &[])]);
        assert!(engine.search("?!", &SearchOptions::default()).is_empty());
    }

    #[test]
    fn clear_resets_state() {
        let engine = SearchEngine::new();
        engine.initialize(vec![entry("/a", "Alpha", "", "x", &[])]);
        assert!(engine.is_initialized());

        engine.clear();
        assert!(!engine.is_initialized());
        assert_eq!(engine.size(), 0);
        assert!(engine.search("alpha", &SearchOptions::default()).is_empty());
    }
}
