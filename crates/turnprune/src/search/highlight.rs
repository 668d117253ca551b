//! Pattern compilation and in-document highlighting.

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use super::{RoleFilter, SearchError, SearchMatch};
use crate::dom::{DocumentAdapter, ElementId, TextId};
use crate::prune::ExchangeUnit;

/// Compile a case-insensitive pattern. Literal queries are escaped first.
pub fn build_pattern(query: &str, use_regex: bool) -> Result<Regex, SearchError> {
    let source = if use_regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| SearchError::InvalidPattern(e.to_string()))
}

/// Author role of a message element: its own role attribute, a descendant's,
/// or failing both, its position in the exchange.
pub fn resolve_role(
    doc: &(impl DocumentAdapter + ?Sized),
    el: ElementId,
    is_prompt: bool,
    role_attr: &str,
) -> RoleFilter {
    let attr = doc.attribute(el, role_attr).or_else(|| {
        doc.query_within(el, &format!("[{role_attr}]"))
            .ok()
            .and_then(|found| found.first().and_then(|&d| doc.attribute(d, role_attr)))
    });
    match attr.as_deref() {
        Some("user") => RoleFilter::User,
        Some("assistant") => RoleFilter::Assistant,
        _ if is_prompt => RoleFilter::User,
        _ => RoleFilter::Assistant,
    }
}

/// Wrap every non-empty match of `pattern` in every element passing
/// `filter`. Matching runs over the element's whole text, so an occurrence
/// split across inline markup is still found; it is wrapped piecewise, one
/// marker per text node. Matches are returned in document order.
pub fn highlight_units(
    doc: &mut (impl DocumentAdapter + ?Sized),
    units: &[ExchangeUnit],
    pattern: &Regex,
    filter: RoleFilter,
    role_attr: &str,
) -> Vec<SearchMatch> {
    let mut matches = Vec::new();
    for (unit_index, unit) in units.iter().enumerate() {
        for el in unit.elements() {
            if filter != RoleFilter::All
                && resolve_role(doc, el, el == unit.prompt, role_attr) != filter
            {
                continue;
            }
            let segments = segments_of(doc, el);
            let text: String = segments.iter().map(|s| s.text.as_str()).collect();
            let ranges: Vec<Range<usize>> = pattern
                .find_iter(&text)
                .filter(|m| !m.is_empty())
                .map(|m| m.range())
                .collect();
            for range in ranges {
                let mut marks = Vec::new();
                for seg in &segments {
                    let start = range.start.max(seg.offset);
                    let end = range.end.min(seg.offset + seg.text.len());
                    if start < end {
                        marks.push(doc.wrap_mark(seg.node, start - seg.offset..end - seg.offset));
                    }
                }
                matches.push(SearchMatch {
                    unit_index,
                    element: el,
                    marks,
                });
            }
        }
    }
    matches
}

/// A text node and where it starts in its element's concatenated text.
struct Segment {
    node: TextId,
    offset: usize,
    text: String,
}

fn segments_of(doc: &(impl DocumentAdapter + ?Sized), el: ElementId) -> Vec<Segment> {
    let mut offset = 0;
    doc.text_nodes(el)
        .into_iter()
        .map(|node| {
            let text = doc.text_of(node);
            let seg = Segment { node, offset, text };
            offset += seg.text.len();
            seg
        })
        .collect()
}
