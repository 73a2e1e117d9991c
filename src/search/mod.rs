//! Query-time search: options, the ranked engine, and excerpts.

pub mod engine;
mod excerpt;

pub use crate::index::SearchResult;
pub use engine::{EngineError, SearchEngine};
pub use excerpt::generate_excerpt;

/// Default number of results per page.
pub const DEFAULT_LIMIT: usize = 10;

/// Default fraction of the top score a result must reach to be kept.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Options for paging and filtering search results.
///
/// Unset fields fall back to the engine's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub threshold: Option<f64>,
}

impl SearchOptions {
    #[must_use]
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            threshold: None,
        }
    }

    /// Fill unset fields from `defaults`.
    #[must_use]
    pub fn or(self, defaults: SearchOptions) -> Self {
        Self {
            limit: self.limit.or(defaults.limit),
            offset: self.offset.or(defaults.offset),
            threshold: self.threshold.or(defaults.threshold),
        }
    }
}
