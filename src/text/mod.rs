//! Text helpers used while building index entries.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Words never emitted as keywords.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "use", "man", "new", "now", "way", "may", "say",
];

/// Markup removed before text extraction, applied in order: scripts,
/// styles, comments, then any remaining tag.
const MARKUP_PATTERNS: [&str; 4] = [
    r"(?is)<script\b[^>]*>.*?</script\s*>",
    r"(?is)<style\b[^>]*>.*?</style\s*>",
    r"(?s)<!--.*?-->",
    r"<[^>]*>",
];

static MARKUP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MARKUP_PATTERNS
        .iter()
        .filter_map(|pattern| {
            Regex::new(pattern)
                .inspect_err(|e| tracing::error!(pattern, error = %e, "Invalid markup pattern"))
                .ok()
        })
        .collect()
});

/// Remove markup, scripts and styles, decode entities and collapse whitespace.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = MARKUP_RES.iter().fold(html.to_string(), |text, re| {
        re.replace_all(&text, " ").into_owned()
    });
    let decoded = html_escape::decode_html_entities(&text);
    normalize_text(&decoded)
}

/// Collapse whitespace runs to single spaces and trim the ends.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_len` characters.
///
/// Prefers the last word boundary before the limit and appends `...` when
/// anything was removed.
#[must_use]
pub fn truncate_content(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_len).collect();
    let kept = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };

    format!("{}...", kept.trim_end())
}

/// Derive keywords from a title and description.
///
/// Lower-cases the text, splits on non-word runs, drops short tokens and
/// stop words, and keeps the first occurrence of each term.
#[must_use]
pub fn extract_keywords(title: &str, description: &str) -> Vec<String> {
    let text = format!("{title} {description}").to_lowercase();
    let mut seen = HashSet::new();

    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().count() > 2)
        .filter(|word| !STOP_WORDS.contains(word))
        .filter(|word| seen.insert((*word).to_string()))
        .map(str::to_string)
        .collect()
}

/// Build a display title from the last segment of a URL path.
///
/// `/getting-started` becomes "Getting Started"; the root path is "Home".
#[must_use]
pub fn title_from_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "Home".to_string();
    }

    let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let segment = segment
        .strip_suffix(".html")
        .or_else(|| segment.strip_suffix(".md"))
        .unwrap_or(segment);

    segment
        .split('-')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A single exclusion rule.
#[derive(Debug, Clone)]
enum ExcludePattern {
    /// Literal prefix match.
    Prefix(String),
    /// Pattern containing `*`, anchored at both ends.
    Wildcard(Regex),
}

/// Decides which URL paths are left out of the index.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<ExcludePattern>,
}

impl PathFilter {
    /// Compile exclusion patterns.
    ///
    /// Patterns without `*` match by prefix. In patterns with `*`, each `*`
    /// matches any run of characters and the rest is matched literally.
    ///
    /// # Errors
    ///
    /// Returns an error if a wildcard pattern does not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                if p.contains('*') {
                    let body = p.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
                    Regex::new(&format!("^{body}$")).map(ExcludePattern::Wildcard)
                } else {
                    Ok(ExcludePattern::Prefix(p.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            ExcludePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            ExcludePattern::Wildcard(re) => re.is_match(path),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
