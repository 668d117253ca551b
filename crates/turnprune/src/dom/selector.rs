//! A small CSS selector subset for [`MemoryDocument`](super::MemoryDocument).
//!
//! Supported: type selectors (`div`, `*`), classes (`.group`), attribute
//! selectors (`[a]`, `[a=v]`, `[a^=v]`, `[a*=v]`, `[a$=v]`), the descendant
//! combinator and comma-separated lists. Pseudo-classes and the `>`, `+`,
//! `~` combinators are reported as unsupported so callers can fall through
//! to the next strategy, the same way a browser rejects syntax it lacks.

use super::DomError;

/// Read access to the element tree that selectors are matched against.
pub(crate) trait NodeView {
    fn tag(&self, el: usize) -> &str;
    fn has_class(&self, el: usize, class: &str) -> bool;
    fn attr(&self, el: usize, name: &str) -> Option<&str>;
    fn parent(&self, el: usize) -> Option<usize>;
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(Vec<Complex>);

/// Compounds joined by descendant combinators; the last one is the subject.
#[derive(Debug, Clone, PartialEq)]
struct Complex(Vec<Compound>);

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Contains,
    Suffix,
}

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let mut list = Vec::new();
        for part in split_top_level(source) {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid(source, "empty selector in list"));
            }
            list.push(Parser::new(source, part).complex()?);
        }
        if list.is_empty() {
            return Err(invalid(source, "empty selector"));
        }
        Ok(Self(list))
    }

    /// Whether element `el` matches any selector in the list.
    pub(crate) fn matches(&self, view: &impl NodeView, el: usize) -> bool {
        self.0.iter().any(|complex| complex.matches(view, el))
    }
}

impl Complex {
    fn matches(&self, view: &impl NodeView, el: usize) -> bool {
        let Some((subject, ancestors)) = self.0.split_last() else {
            return false;
        };
        if !subject.matches(view, el) {
            return false;
        }
        // Greedy right-to-left walk is exact for descendant-only chains.
        let mut cursor = view.parent(el);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(node) if compound.matches(view, node) => {
                        cursor = view.parent(node);
                        break;
                    }
                    Some(node) => cursor = view.parent(node),
                    None => return false,
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches(&self, view: &impl NodeView, el: usize) -> bool {
        if let Some(ref tag) = self.tag
            && !view.tag(el).eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if !self.classes.iter().all(|c| view.has_class(el, c)) {
            return false;
        }
        self.attrs.iter().all(|a| {
            let Some(actual) = view.attr(el, &a.name) else {
                return false;
            };
            match a.op {
                AttrOp::Exists => true,
                AttrOp::Equals => actual == a.value,
                AttrOp::Prefix => !a.value.is_empty() && actual.starts_with(&a.value),
                AttrOp::Contains => !a.value.is_empty() && actual.contains(&a.value),
                AttrOp::Suffix => !a.value.is_empty() && actual.ends_with(&a.value),
            }
        })
    }
}

/// Split on commas that are not inside brackets or quotes.
#[allow(clippy::string_slice)] // split points are ASCII commas
fn split_top_level(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

fn invalid(source: &str, reason: &str) -> DomError {
    DomError::InvalidSelector {
        selector: source.to_string(),
        reason: reason.to_string(),
    }
}

fn unsupported(source: &str, reason: &str) -> DomError {
    DomError::UnsupportedSelector {
        selector: source.to_string(),
        reason: reason.to_string(),
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, part: &str) -> Self {
        Self {
            source,
            chars: part.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn complex(&mut self) -> Result<Complex, DomError> {
        let mut compounds = vec![self.compound()?];
        while self.peek().is_some() {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some('>' | '+' | '~') => {
                    return Err(unsupported(self.source, "only descendant combinators"));
                }
                Some(_) => compounds.push(self.compound()?),
            }
        }
        Ok(Complex(compounds))
    }

    fn compound(&mut self) -> Result<Compound, DomError> {
        let mut compound = Compound::default();
        let mut any = false;
        while let Some(c) = self.peek() {
            match c {
                '*' if !any => {
                    self.pos += 1;
                }
                c if is_ident_char(c) && !any => {
                    compound.tag = Some(self.ident()?.to_ascii_lowercase());
                }
                '.' => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                '[' => {
                    self.pos += 1;
                    compound.attrs.push(self.attr()?);
                }
                ':' => return Err(unsupported(self.source, "pseudo-classes")),
                c if c.is_whitespace() => break,
                '>' | '+' | '~' => break,
                _ => return Err(invalid(self.source, &format!("unexpected `{c}`"))),
            }
            any = true;
        }
        if !any {
            return Err(invalid(self.source, "expected a compound selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, DomError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(invalid(self.source, "expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attr(&mut self) -> Result<AttrMatch, DomError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let op = match self.bump() {
            Some(']') => {
                return Ok(AttrMatch {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some(c @ ('^' | '*' | '$')) => {
                if self.bump() != Some('=') {
                    return Err(invalid(self.source, "expected `=` in attribute selector"));
                }
                match c {
                    '^' => AttrOp::Prefix,
                    '*' => AttrOp::Contains,
                    _ => AttrOp::Suffix,
                }
            }
            Some('~' | '|') => return Err(unsupported(self.source, "attribute operator")),
            _ => return Err(invalid(self.source, "malformed attribute selector")),
        };
        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != q) {
                    self.pos += 1;
                }
                if self.bump() != Some(q) {
                    return Err(invalid(self.source, "unterminated string"));
                }
                self.chars[start..self.pos - 1].iter().collect()
            }
            _ => self.ident()?,
        };
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(invalid(self.source, "expected `]`"));
        }
        Ok(AttrMatch { name, op, value })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Tree {
        tags: Vec<&'static str>,
        classes: Vec<Vec<&'static str>>,
        attrs: Vec<HashMap<&'static str, &'static str>>,
        parents: Vec<Option<usize>>,
    }

    impl NodeView for Tree {
        fn tag(&self, el: usize) -> &str {
            self.tags[el]
        }
        fn has_class(&self, el: usize, class: &str) -> bool {
            self.classes[el].contains(&class)
        }
        fn attr(&self, el: usize, name: &str) -> Option<&str> {
            self.attrs[el].get(name).copied()
        }
        fn parent(&self, el: usize) -> Option<usize> {
            self.parents[el]
        }
    }

    /// main > div.group.w-full[data-testid=conversation-turn-3] > article
    fn tree() -> Tree {
        Tree {
            tags: vec!["main", "div", "article"],
            classes: vec![vec![], vec!["group", "w-full"], vec![]],
            attrs: vec![
                HashMap::new(),
                HashMap::from([("data-testid", "conversation-turn-3")]),
                HashMap::from([("data-message-author-role", "user")]),
            ],
            parents: vec![None, Some(0), Some(1)],
        }
    }

    #[test]
    fn attribute_operators() {
        let t = tree();
        let prefix = SelectorList::parse(r#"[data-testid^="conversation-turn-"]"#).unwrap();
        assert!(prefix.matches(&t, 1));
        assert!(!prefix.matches(&t, 2));

        let contains = SelectorList::parse("[data-testid*='turn']").unwrap();
        assert!(contains.matches(&t, 1));

        let exists = SelectorList::parse("[data-message-author-role]").unwrap();
        assert!(exists.matches(&t, 2));

        let equals = SelectorList::parse("article[data-message-author-role=assistant]").unwrap();
        assert!(!equals.matches(&t, 2));
    }

    #[test]
    fn classes_and_descendants() {
        let t = tree();
        let sel = SelectorList::parse("div.group.w-full").unwrap();
        assert!(sel.matches(&t, 1));
        let sel = SelectorList::parse("main article").unwrap();
        assert!(sel.matches(&t, 2));
        assert!(!sel.matches(&t, 1));
        let sel = SelectorList::parse("section article").unwrap();
        assert!(!sel.matches(&t, 2));
    }

    #[test]
    fn comma_lists_match_any() {
        let t = tree();
        let sel = SelectorList::parse("li[data-message-author-role], main article").unwrap();
        assert!(sel.matches(&t, 2));
    }

    #[test]
    fn pseudo_classes_are_unsupported() {
        let err = SelectorList::parse("div.group:has(.text-token-text-primary)").unwrap_err();
        assert!(matches!(err, DomError::UnsupportedSelector { .. }));
        let err = SelectorList::parse("main > article").unwrap_err();
        assert!(matches!(err, DomError::UnsupportedSelector { .. }));
    }

    #[test]
    fn malformed_selectors_are_invalid() {
        assert!(matches!(
            SelectorList::parse("[data-x").unwrap_err(),
            DomError::InvalidSelector { .. }
        ));
        assert!(matches!(
            SelectorList::parse("div,,p").unwrap_err(),
            DomError::InvalidSelector { .. }
        ));
    }
}
