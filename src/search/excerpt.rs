//! Excerpt selection for search results.

use crate::index::SearchIndexEntry;

/// Target excerpt length in characters.
pub const EXCERPT_LENGTH: usize = 200;

/// Pick the text shown under a result.
///
/// The stored description is used verbatim when present. Otherwise a window
/// of content around the first case-insensitive occurrence of `query` is
/// widened to whole words, with `...` marking either cut end. Without a match
/// the first [`EXCERPT_LENGTH`] characters of content are used.
#[must_use]
pub fn generate_excerpt(entry: &SearchIndexEntry, query: &str) -> String {
    if !entry.description.is_empty() {
        return entry.description.clone();
    }

    let content: Vec<char> = entry.content.chars().collect();
    let needle: Vec<char> = query.trim().chars().map(fold).collect();

    let Some(pos) = find_folded(&content, &needle) else {
        return content.iter().take(EXCERPT_LENGTH).collect();
    };

    let half = EXCERPT_LENGTH / 2;
    let mut start = pos.saturating_sub(half);
    let mut end = (pos + needle.len() + half).min(content.len());

    while start > 0 && !content[start - 1].is_whitespace() {
        start -= 1;
    }
    while end < content.len() && !content[end].is_whitespace() {
        end += 1;
    }

    let body: String = content[start..end].iter().collect();
    let mut excerpt = String::with_capacity(body.len() + 6);
    if start > 0 {
        excerpt.push_str("...");
    }
    excerpt.push_str(body.trim());
    if end < content.len() {
        excerpt.push_str("...");
    }
    excerpt
}

/// One-to-one lower-casing so char positions stay aligned with the source.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn find_folded(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.iter().zip(needle).all(|(h, n)| fold(*h) == *n))
}
