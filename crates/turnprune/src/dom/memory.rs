//! In-memory [`DocumentAdapter`] implementation.
//!
//! [`MemoryDocument`] models just enough of a chat page for the engine to run
//! unmodified: a `body > main` tree of turn elements carrying the attributes
//! real pages expose, text nodes that can be wrapped in highlight marks, a
//! vertical layout where hidden turns collapse to zero height, and a single
//! scroll viewport over the conversation.

use std::collections::BTreeMap;
use std::ops::Range;

use super::selector::{NodeView, SelectorList};
use super::{DocumentAdapter, DomError, ElementId, MarkId, ScrollBehavior, ScrollMetrics, TextId};
use crate::indicator::IndicatorView;

/// Layout height given to each appended turn.
pub const DEFAULT_TURN_HEIGHT: f64 = 120.0;

/// Height of the scroll viewport.
const CLIENT_HEIGHT: f64 = 800.0;

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    parent: Option<usize>,
    children: Vec<Child>,
    visible: bool,
    height: f64,
}

impl Element {
    fn new(tag: &str, parent: Option<usize>) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            parent,
            children: Vec::new(),
            visible: true,
            height: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Child {
    Element(usize),
    Text(usize),
}

#[derive(Debug, Clone)]
struct TextNode {
    text: String,
}

/// A highlight marker wrapped around part of a text node.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub node: TextId,
    pub range: Range<usize>,
    pub active: bool,
}

/// An in-memory chat page.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    elements: Vec<Element>,
    texts: Vec<TextNode>,
    marks: Vec<Mark>,
    body: usize,
    main: usize,
    composer: Option<usize>,
    stop_button: Option<usize>,
    turns: usize,
    scroll_top: Option<f64>,
    dark: bool,
    observed: Option<ElementId>,
    indicator: Option<IndicatorView>,
    scroll_requests: Vec<(ElementId, ScrollBehavior)>,
    accept_reload: bool,
    reload_prompts: usize,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty page: `body > main` with a scrollable conversation.
    pub fn new() -> Self {
        let mut doc = Self {
            elements: vec![Element::new("body", None)],
            texts: Vec::new(),
            marks: Vec::new(),
            body: 0,
            main: 0,
            composer: None,
            stop_button: None,
            turns: 0,
            scroll_top: Some(0.0),
            dark: false,
            observed: None,
            indicator: None,
            scroll_requests: Vec::new(),
            accept_reload: false,
            reload_prompts: 0,
        };
        doc.main = doc.push_element("main", doc.body);
        doc
    }

    /// Drop the scroll container, so scroll metrics are unavailable.
    pub fn without_scroll_container(mut self) -> Self {
        self.scroll_top = None;
        self
    }

    /// Set the color-scheme preference reported to the indicator.
    pub fn with_dark_scheme(mut self, dark: bool) -> Self {
        self.dark = dark;
        self
    }

    /// Decide how the reload confirmation prompt is answered.
    pub fn with_reload_answer(mut self, accept: bool) -> Self {
        self.accept_reload = accept;
        self
    }

    /// Append a conversation turn with a single text node.
    pub fn append_turn(&mut self, role: &str, text: &str) -> ElementId {
        self.append_turn_parts(role, &[text])
    }

    /// Append a conversation turn whose content is split across several
    /// text nodes (paragraphs).
    pub fn append_turn_parts(&mut self, role: &str, parts: &[&str]) -> ElementId {
        let turn = self.push_element("article", self.main);
        let el = &mut self.elements[turn];
        el.classes = vec!["w-full".into(), "text-token-text-primary".into()];
        el.attrs.insert(
            "data-testid".into(),
            format!("conversation-turn-{}", self.turns + 1),
        );
        el.attrs
            .insert("data-message-author-role".into(), role.to_string());
        el.height = DEFAULT_TURN_HEIGHT;
        self.turns += 1;

        let content = self.push_element("div", turn);
        self.elements[content].classes = vec!["markdown-content".into()];
        for part in parts {
            let p = self.push_element("p", content);
            self.push_text(p, part);
        }
        ElementId(turn)
    }

    /// Add the message composer (a form with a textarea and send button).
    pub fn add_composer(&mut self) -> ElementId {
        if let Some(form) = self.composer {
            return ElementId(form);
        }
        let form = self.push_element("form", self.body);
        let textarea = self.push_element("textarea", form);
        self.elements[textarea]
            .attrs
            .insert("id".into(), "prompt-textarea".into());
        self.push_text(textarea, "Message ChatGPT and wait for a reply");
        let send = self.push_element("button", form);
        self.elements[send]
            .attrs
            .insert("aria-label".into(), "Send".into());
        self.composer = Some(form);
        ElementId(form)
    }

    /// Show or remove the stop-generating control.
    pub fn set_generating(&mut self, generating: bool) {
        match (generating, self.stop_button) {
            (true, None) => {
                let parent = self.composer.unwrap_or(self.body);
                let button = self.push_element("button", parent);
                let attrs = &mut self.elements[button].attrs;
                attrs.insert("data-testid".into(), "stop-button".into());
                attrs.insert("aria-label".into(), "Stop generating".into());
                self.stop_button = Some(button);
            }
            (false, Some(button)) => {
                self.detach(button);
                self.stop_button = None;
            }
            _ => {}
        }
    }

    /// Whether `el` is currently laid out.
    pub fn is_visible(&self, el: ElementId) -> bool {
        self.rendered(el.0)
    }

    /// Every highlight marker currently wrapped in the document.
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// The text covered by each highlight marker, in wrap order.
    pub fn highlighted_text(&self) -> Vec<String> {
        self.marks
            .iter()
            .filter_map(|m| self.texts[m.node.0].text.get(m.range.clone()))
            .map(str::to_string)
            .collect()
    }

    /// Current intersection-observer target.
    pub fn observed(&self) -> Option<ElementId> {
        self.observed
    }

    /// Last view drawn by the indicator, if the badge is present.
    pub fn indicator(&self) -> Option<&IndicatorView> {
        self.indicator.as_ref()
    }

    /// Every `scroll_into_view` request, oldest first.
    pub fn scroll_requests(&self) -> &[(ElementId, ScrollBehavior)] {
        &self.scroll_requests
    }

    /// How many times the reload prompt was shown.
    pub fn reload_prompts(&self) -> usize {
        self.reload_prompts
    }

    /// Vertical offset of `el` within the scroll content.
    pub fn offset_of(&self, el: ElementId) -> f64 {
        self.document_order(self.body)
            .into_iter()
            .take_while(|&node| node != el.0)
            .filter(|&node| self.rendered(node))
            .map(|node| self.elements[node].height)
            .sum()
    }

    // ── Tree plumbing ──

    fn push_element(&mut self, tag: &str, parent: usize) -> usize {
        let id = self.elements.len();
        self.elements.push(Element::new(tag, Some(parent)));
        self.elements[parent].children.push(Child::Element(id));
        id
    }

    fn push_text(&mut self, parent: usize, text: &str) -> usize {
        let id = self.texts.len();
        self.texts.push(TextNode {
            text: text.to_string(),
        });
        self.elements[parent].children.push(Child::Text(id));
        id
    }

    fn detach(&mut self, el: usize) {
        if let Some(parent) = self.elements[el].parent.take() {
            self.elements[parent]
                .children
                .retain(|c| !matches!(c, Child::Element(e) if *e == el));
        }
    }

    /// Elements under `root` (inclusive) in document order.
    fn document_order(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.elements[node].children.iter().rev() {
                if let Child::Element(e) = child {
                    stack.push(*e);
                }
            }
        }
        out
    }

    fn descendant_texts(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![Child::Element(root)];
        while let Some(child) = stack.pop() {
            match child {
                Child::Text(t) => out.push(t),
                Child::Element(e) => stack.extend(self.elements[e].children.iter().rev().copied()),
            }
        }
        out
    }

    fn rendered(&self, el: usize) -> bool {
        let mut cursor = Some(el);
        while let Some(node) = cursor {
            if !self.elements[node].visible {
                return false;
            }
            cursor = self.elements[node].parent;
        }
        true
    }

    fn attached(&self, el: usize) -> bool {
        let mut cursor = el;
        loop {
            if cursor == self.body {
                return true;
            }
            match self.elements[cursor].parent {
                Some(p) => cursor = p,
                None => return false,
            }
        }
    }

    fn scroll_height(&self) -> f64 {
        self.document_order(self.body)
            .into_iter()
            .filter(|&node| self.rendered(node))
            .map(|node| self.elements[node].height)
            .sum()
    }

    fn max_scroll(&self) -> f64 {
        (self.scroll_height() - CLIENT_HEIGHT).max(0.0)
    }

    fn check(&self, el: ElementId) -> Result<usize, DomError> {
        if el.0 < self.elements.len() {
            Ok(el.0)
        } else {
            Err(DomError::UnknownNode(el.0))
        }
    }
}

impl NodeView for MemoryDocument {
    fn tag(&self, el: usize) -> &str {
        &self.elements[el].tag
    }

    fn has_class(&self, el: usize, class: &str) -> bool {
        self.elements[el].classes.iter().any(|c| c == class)
    }

    fn attr(&self, el: usize, name: &str) -> Option<&str> {
        self.elements[el].attrs.get(name).map(String::as_str)
    }

    fn parent(&self, el: usize) -> Option<usize> {
        self.elements[el].parent
    }
}

impl DocumentAdapter for MemoryDocument {
    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>, DomError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .document_order(self.body)
            .into_iter()
            .filter(|&node| list.matches(self, node))
            .map(ElementId)
            .collect())
    }

    fn query_within(&self, el: ElementId, selector: &str) -> Result<Vec<ElementId>, DomError> {
        let root = self.check(el)?;
        let list = SelectorList::parse(selector)?;
        Ok(self
            .document_order(root)
            .into_iter()
            .skip(1)
            .filter(|&node| list.matches(self, node))
            .map(ElementId)
            .collect())
    }

    fn closest(&self, el: ElementId, selector: &str) -> Result<Option<ElementId>, DomError> {
        let mut cursor = Some(self.check(el)?);
        let list = SelectorList::parse(selector)?;
        while let Some(node) = cursor {
            if list.matches(self, node) {
                return Ok(Some(ElementId(node)));
            }
            cursor = self.elements[node].parent;
        }
        Ok(None)
    }

    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.elements.get(el.0)?.attrs.get(name).cloned()
    }

    fn text_content(&self, el: ElementId) -> String {
        if el.0 >= self.elements.len() || !self.attached(el.0) {
            return String::new();
        }
        self.descendant_texts(el.0)
            .into_iter()
            .map(|t| self.texts[t].text.as_str())
            .collect()
    }

    fn text_nodes(&self, el: ElementId) -> Vec<TextId> {
        if el.0 >= self.elements.len() {
            return Vec::new();
        }
        self.descendant_texts(el.0).into_iter().map(TextId).collect()
    }

    fn text_of(&self, node: TextId) -> String {
        self.texts
            .get(node.0)
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    fn wrap_mark(&mut self, node: TextId, range: Range<usize>) -> MarkId {
        let id = MarkId(self.marks.len());
        self.marks.push(Mark {
            node,
            range,
            active: false,
        });
        id
    }

    fn set_mark_active(&mut self, mark: MarkId, active: bool) {
        if let Some(m) = self.marks.get_mut(mark.0) {
            m.active = active;
        }
    }

    fn unwrap_all_marks(&mut self) {
        self.marks.clear();
    }

    fn set_visibility(&mut self, el: ElementId, visible: bool) {
        if let Some(e) = self.elements.get_mut(el.0) {
            e.visible = visible;
        }
        if let Some(top) = self.scroll_top {
            self.scroll_top = Some(top.min(self.max_scroll()));
        }
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        self.scroll_top.map(|scroll_top| ScrollMetrics {
            scroll_top,
            scroll_height: self.scroll_height(),
            client_height: CLIENT_HEIGHT,
        })
    }

    fn set_scroll_top(&mut self, top: f64) {
        if self.scroll_top.is_some() {
            self.scroll_top = Some(top.clamp(0.0, self.max_scroll()));
        }
    }

    fn scroll_into_view(&mut self, el: ElementId, behavior: ScrollBehavior) {
        self.scroll_requests.push((el, behavior));
        if el.0 < self.elements.len() {
            let center = self.offset_of(el) + self.elements[el.0].height / 2.0;
            self.set_scroll_top(center - CLIENT_HEIGHT / 2.0);
        }
    }

    fn observe_intersection(&mut self, target: Option<ElementId>) {
        self.observed = target;
    }

    fn prefers_dark(&self) -> bool {
        self.dark
    }

    fn render_indicator(&mut self, view: Option<&IndicatorView>) {
        self.indicator = view.cloned();
    }

    fn confirm_reload(&mut self) -> bool {
        self.reload_prompts += 1;
        self.accept_reload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_found_by_conversation_selectors() {
        let mut doc = MemoryDocument::new();
        let a = doc.append_turn("user", "first question here");
        let b = doc.append_turn("assistant", "first answer here");
        let found = doc
            .query_selector_all(r#"[data-testid^="conversation-turn-"]"#)
            .unwrap();
        assert_eq!(found, vec![a, b]);
        assert_eq!(doc.query_selector_all("main article").unwrap(), vec![a, b]);
    }

    #[test]
    fn text_content_concatenates_paragraphs() {
        let mut doc = MemoryDocument::new();
        let turn = doc.append_turn_parts("assistant", &["alpha ", "beta"]);
        assert_eq!(doc.text_content(turn), "alpha beta");
        assert_eq!(doc.text_nodes(turn).len(), 2);
    }

    #[test]
    fn hiding_collapses_layout_and_clamps_scroll() {
        let mut doc = MemoryDocument::new();
        let turns: Vec<_> = (0..10)
            .map(|i| doc.append_turn("user", &format!("message number {i}")))
            .collect();
        doc.set_scroll_top(400.0);
        assert_eq!(doc.scroll_metrics().unwrap().scroll_height, 1200.0);

        for t in &turns[..5] {
            doc.set_visibility(*t, false);
        }
        let metrics = doc.scroll_metrics().unwrap();
        assert_eq!(metrics.scroll_height, 600.0);
        assert_eq!(metrics.scroll_top, 0.0);
        assert!(!doc.is_visible(turns[0]));
        assert!(doc.is_visible(turns[9]));
    }

    #[test]
    fn composer_is_inside_a_form() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_composer();
        let textarea = doc.query_selector_all("textarea").unwrap()[0];
        assert_eq!(doc.closest(textarea, "form").unwrap(), Some(form));
    }

    #[test]
    fn stop_button_comes_and_goes() {
        let mut doc = MemoryDocument::new();
        doc.add_composer();
        doc.set_generating(true);
        let sel = r#"button[data-testid="stop-button"]"#;
        assert_eq!(doc.query_selector_all(sel).unwrap().len(), 1);
        doc.set_generating(false);
        assert!(doc.query_selector_all(sel).unwrap().is_empty());
    }

    #[test]
    fn marks_cover_text_without_changing_it() {
        let mut doc = MemoryDocument::new();
        let turn = doc.append_turn("user", "find the needle");
        let node = doc.text_nodes(turn)[0];
        doc.wrap_mark(node, 9..15);
        assert_eq!(doc.highlighted_text(), vec!["needle".to_string()]);
        assert_eq!(doc.text_content(turn), "find the needle");
        doc.unwrap_all_marks();
        assert!(doc.marks().is_empty());
    }

    #[test]
    fn scroll_into_view_centers_element() {
        let mut doc = MemoryDocument::new();
        let turns: Vec<_> = (0..20)
            .map(|i| doc.append_turn("user", &format!("message number {i}")))
            .collect();
        doc.scroll_into_view(turns[10], ScrollBehavior::Instant);
        let top = doc.scroll_metrics().unwrap().scroll_top;
        assert_eq!(top, 10.0 * DEFAULT_TURN_HEIGHT + DEFAULT_TURN_HEIGHT / 2.0 - 400.0);
    }
}
