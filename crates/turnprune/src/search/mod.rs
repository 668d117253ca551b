//! Search and highlight over every located message, hidden or not.
//!
//! A search compiles the query (literal or regex, always case-insensitive),
//! wraps each match in a highlight marker and remembers the match list. The
//! engine then force-reveals matching units and moves the viewport to the
//! current match. Repeating the same `(query, options)` or asking for
//! `next`/`prev` only moves the cursor, with wraparound.
//!
//! Invalid input never mutates anything: the pattern is compiled before any
//! marker is touched.

mod highlight;

pub use highlight::{build_pattern, highlight_units, resolve_role};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::{ElementId, MarkId};

/// Shortest accepted query, in characters.
pub const MIN_QUERY_CHARS: usize = 2;

/// Errors surfaced in a search result's `error` field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid regex: {0}")]
    InvalidPattern(String),
    #[error("Query too short")]
    QueryTooShort,
}

/// What a search request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAction {
    #[default]
    Search,
    Next,
    Prev,
}

/// Restrict a search to one author role.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RoleFilter {
    #[default]
    #[serde(rename = "", alias = "all")]
    All,
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub use_regex: bool,
    pub filter: RoleFilter,
}

/// One occurrence of the query. An occurrence that crosses inline markup
/// is wrapped in one marker per text node it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Index of the containing unit when the search ran.
    pub unit_index: usize,
    pub element: ElementId,
    pub marks: Vec<MarkId>,
}

/// Counts reported back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Number of units with at least one match.
    pub matches: usize,
    /// 1-based position of the current match, `0` when there is none.
    pub current_index: usize,
    /// Number of occurrences.
    pub total: usize,
}

/// Current query, its matches and the cursor.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: Option<(String, SearchOptions)>,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

impl SearchState {
    /// Whether `query`/`options` is the search already on screen.
    pub fn is_current(&self, query: &str, options: &SearchOptions) -> bool {
        self.query
            .as_ref()
            .is_some_and(|(q, o)| q == query && o == options)
    }

    pub fn is_active(&self) -> bool {
        self.query.is_some()
    }

    pub fn query(&self) -> Option<(&str, &SearchOptions)> {
        self.query.as_ref().map(|(q, o)| (q.as_str(), o))
    }

    /// Replace the search with a fresh match list. The cursor lands on the
    /// first match, if any.
    pub fn reset(&mut self, query: String, options: SearchOptions, matches: Vec<SearchMatch>) {
        self.current = (!matches.is_empty()).then_some(0);
        self.matches = matches;
        self.query = Some((query, options));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn current(&self) -> Option<SearchMatch> {
        self.current.and_then(|i| self.matches.get(i).cloned())
    }

    /// Move the cursor with wraparound. Returns the match moved away from
    /// and the one moved to, or `None` when there are no matches.
    pub fn step(&mut self, action: SearchAction) -> Option<(Option<SearchMatch>, SearchMatch)> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        let previous = self.current();
        let next = match (action, self.current) {
            (_, None) => 0,
            (SearchAction::Prev, Some(i)) => (i + len - 1) % len,
            (_, Some(i)) => (i + 1) % len,
        };
        self.current = Some(next);
        Some((previous, self.matches[next].clone()))
    }

    pub fn outcome(&self) -> SearchOutcome {
        let mut units: Vec<usize> = self.matches.iter().map(|m| m.unit_index).collect();
        units.dedup();
        SearchOutcome {
            matches: units.len(),
            current_index: self.current.map_or(0, |i| i + 1),
            total: self.matches.len(),
        }
    }
}
