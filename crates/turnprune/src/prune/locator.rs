//! Message discovery: ordered selector strategies over the live page.
//!
//! Chat pages change markup without notice, so discovery is configuration,
//! not logic: a priority-ordered list of [`Matcher`]s, tried in turn. The
//! first matcher that yields at least one element passing the content filter
//! wins. Supporting a new page version means adding a matcher.

use tracing::{debug, trace};

use crate::config::SelectorConfig;
use crate::dom::{DocumentAdapter, ElementId};

/// Built-in fallback strategies, newest page structure first.
pub const DEFAULT_MATCHERS: &[(&str, &str)] = &[
    ("conversation-turn", r#"[data-testid^="conversation-turn-"]"#),
    ("group-turn", "div.group.w-full:has(.text-token-text-primary)"),
    ("conversation-item", r#"div[class*="ConversationItem"]"#),
    ("main-article", "main article"),
    ("relative-flex", "div.relative.flex.w-full"),
];

/// Minimum text length (in chars) for an element to count as a message.
pub const MIN_MESSAGE_CHARS: usize = 10;

/// Controls that mark an element as part of the input area.
const CONTROL_SELECTORS: &[&str] = &["textarea", r#"button[aria-label="Send"]"#];

/// One discovery strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub selector: String,
}

impl Matcher {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
        }
    }
}

/// Result of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Located {
    /// Message elements in document order.
    pub elements: Vec<ElementId>,
    /// Name of the matcher that produced them.
    pub matcher: Option<String>,
}

impl Located {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Finds message elements using an ordered list of matchers.
#[derive(Debug, Clone)]
pub struct MessageLocator {
    matchers: Vec<Matcher>,
    min_chars: usize,
}

impl Default for MessageLocator {
    fn default() -> Self {
        Self::new(
            DEFAULT_MATCHERS
                .iter()
                .map(|(name, sel)| Matcher::new(*name, *sel))
                .collect(),
        )
    }
}

impl MessageLocator {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self {
            matchers,
            min_chars: MIN_MESSAGE_CHARS,
        }
    }

    /// The configured message selector first, then the built-in fallbacks.
    pub fn from_selectors(selectors: &SelectorConfig) -> Self {
        let mut locator = Self::default();
        let configured = selectors.message.trim();
        if !configured.is_empty() && !locator.matchers.iter().any(|m| m.selector == configured) {
            locator
                .matchers
                .insert(0, Matcher::new("configured", configured));
        }
        locator
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Run discovery. Never fails: selector errors are logged and skipped,
    /// and "nothing found" is an empty result.
    pub fn locate(&self, doc: &(impl DocumentAdapter + ?Sized)) -> Located {
        for matcher in &self.matchers {
            let found = match doc.query_selector_all(&matcher.selector) {
                Ok(found) => found,
                Err(e) => {
                    trace!(matcher = %matcher.name, "selector skipped: {e}");
                    continue;
                }
            };
            if found.is_empty() {
                continue;
            }
            let elements: Vec<ElementId> = found
                .into_iter()
                .filter(|&el| self.is_message(doc, el))
                .collect();
            if !elements.is_empty() {
                debug!(
                    matcher = %matcher.name,
                    "found {} messages",
                    elements.len()
                );
                return Located {
                    elements,
                    matcher: Some(matcher.name.clone()),
                };
            }
        }
        Located::default()
    }

    /// Content filter: non-trivial text, no input controls, not in a form.
    fn is_message(&self, doc: &(impl DocumentAdapter + ?Sized), el: ElementId) -> bool {
        if doc.text_content(el).chars().count() <= self.min_chars {
            return false;
        }
        let has_control = CONTROL_SELECTORS
            .iter()
            .any(|sel| doc.query_within(el, sel).is_ok_and(|found| !found.is_empty()));
        if has_control {
            return false;
        }
        !matches!(doc.closest(el, "form"), Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;

    #[test]
    fn empty_page_is_not_an_error() {
        let doc = MemoryDocument::new();
        let located = MessageLocator::default().locate(&doc);
        assert!(located.is_empty());
        assert_eq!(located.matcher, None);
    }

    #[test]
    fn first_matching_strategy_wins() {
        let mut doc = MemoryDocument::new();
        let a = doc.append_turn("user", "a question long enough");
        let b = doc.append_turn("assistant", "an answer long enough");
        let located = MessageLocator::default().locate(&doc);
        assert_eq!(located.elements, vec![a, b]);
        assert_eq!(located.matcher.as_deref(), Some("conversation-turn"));
    }

    #[test]
    fn unsupported_selectors_fall_through() {
        let mut doc = MemoryDocument::new();
        let a = doc.append_turn("user", "a question long enough");
        let locator = MessageLocator::new(vec![
            Matcher::new("has", "div:has(p)"),
            Matcher::new("articles", "main article"),
        ]);
        let located = locator.locate(&doc);
        assert_eq!(located.elements, vec![a]);
        assert_eq!(located.matcher.as_deref(), Some("articles"));
    }

    #[test]
    fn short_and_control_elements_are_filtered() {
        let mut doc = MemoryDocument::new();
        doc.append_turn("user", "hi");
        let kept = doc.append_turn("assistant", "a reply with enough text");
        doc.add_composer();
        let locator = MessageLocator::new(vec![Matcher::new("any", "article, form, textarea")]);
        let located = locator.locate(&doc);
        assert_eq!(located.elements, vec![kept]);
    }

    #[test]
    fn configured_selector_is_tried_first() {
        let selectors = SelectorConfig::default();
        let locator = MessageLocator::from_selectors(&selectors);
        assert_eq!(locator.matchers()[0].name, "configured");
        assert_eq!(locator.matchers().len(), DEFAULT_MATCHERS.len() + 1);

        let mut doc = MemoryDocument::new();
        doc.append_turn("user", "a question long enough");
        assert_eq!(
            locator.locate(&doc).matcher.as_deref(),
            Some("configured")
        );
    }
}
