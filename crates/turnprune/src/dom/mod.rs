//! Document adapter: the only window the engine has onto the host page.
//!
//! The pruning and search algorithms never touch a real DOM. Selector
//! queries, text reads, visibility toggles, highlight marks, scroll position,
//! intersection targeting and the on-page badge all go through
//! [`DocumentAdapter`]. A browser binding implements it over the live page;
//! [`MemoryDocument`] implements it over an in-memory tree for tests and the
//! CLI.
//!
//! Handles ([`ElementId`], [`TextId`], [`MarkId`]) are opaque. The engine
//! never creates or destroys elements: it reads them and flips presentation.

mod fixture;
mod memory;
mod selector;

pub use fixture::{ConversationFixture, FixtureTurn};
pub use memory::{DEFAULT_TURN_HEIGHT, MemoryDocument};
pub use selector::SelectorList;

use std::ops::Range;

use thiserror::Error;

use crate::indicator::IndicatorView;

/// Opaque handle to an element in the host document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// Opaque handle to a text node in the host document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextId(pub usize);

/// Handle to an inline highlight marker wrapped around part of a text node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(pub usize);

/// Errors raised by document queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    /// The selector uses syntax the document cannot evaluate (e.g. `:has`).
    #[error("unsupported selector `{selector}`: {reason}")]
    UnsupportedSelector { selector: String, reason: String },
    /// The selector is malformed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    /// The handle does not refer to a live node.
    #[error("unknown node handle {0}")]
    UnknownNode(usize),
}

/// Scroll state of the nearest scrollable ancestor of the conversation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

/// How [`DocumentAdapter::scroll_into_view`] should move the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// Capability interface over the host page.
///
/// Query methods follow DOM semantics: results are in document order and a
/// selector the implementation cannot evaluate is an error rather than an
/// empty match, so callers can tell "nothing here" from "can't ask".
pub trait DocumentAdapter {
    /// All elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, DomError>;

    /// Descendants of `el` matching `selector`, in document order.
    fn query_within(&self, el: ElementId, selector: &str) -> Result<Vec<ElementId>, DomError>;

    /// Nearest inclusive ancestor of `el` matching `selector`.
    fn closest(&self, el: ElementId, selector: &str) -> Result<Option<ElementId>, DomError>;

    /// Attribute value on `el`, if present.
    fn attribute(&self, el: ElementId, name: &str) -> Option<String>;

    /// Concatenated text of every text node under `el`.
    fn text_content(&self, el: ElementId) -> String;

    /// Text nodes under `el`, in document order.
    fn text_nodes(&self, el: ElementId) -> Vec<TextId>;

    /// Current text of a text node.
    fn text_of(&self, node: TextId) -> String;

    /// Wrap `range` (byte offsets, char-aligned) of a text node in a
    /// highlight marker.
    fn wrap_mark(&mut self, node: TextId, range: Range<usize>) -> MarkId;

    /// Toggle the "current match" emphasis on a marker.
    fn set_mark_active(&mut self, mark: MarkId, active: bool);

    /// Remove every highlight marker, restoring the original text nodes.
    fn unwrap_all_marks(&mut self);

    /// Show or suppress `el` from layout. Never removes the node.
    fn set_visibility(&mut self, el: ElementId, visible: bool);

    /// Scroll metrics of the conversation's scroll container, or `None`
    /// when no scrollable ancestor could be identified.
    fn scroll_metrics(&self) -> Option<ScrollMetrics>;

    /// Set the scroll offset of the conversation's scroll container.
    fn set_scroll_top(&mut self, top: f64);

    /// Scroll `el` to the vertical center of the viewport.
    fn scroll_into_view(&mut self, el: ElementId, behavior: ScrollBehavior);

    /// Point the viewport-intersection observer at `target` (or detach it).
    fn observe_intersection(&mut self, target: Option<ElementId>);

    /// Whether the host prefers a dark color scheme.
    fn prefers_dark(&self) -> bool;

    /// Draw the indicator badge, or remove it when `None`.
    fn render_indicator(&mut self, view: Option<&IndicatorView>);

    /// Ask the user whether to reload the page. Returns `true` if a reload
    /// was accepted.
    fn confirm_reload(&mut self) -> bool;
}
