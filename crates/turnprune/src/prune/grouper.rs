//! Pairs the flat message sequence into prompt/response exchanges.

use crate::dom::{DocumentAdapter, ElementId};

/// A prompt and its response. A unit without a response is an exchange
/// still waiting for the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeUnit {
    pub prompt: ElementId,
    pub response: Option<ElementId>,
}

impl ExchangeUnit {
    /// Elements of this unit in order.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> {
        std::iter::once(self.prompt).chain(self.response)
    }

    pub fn contains(&self, el: ElementId) -> bool {
        self.prompt == el || self.response == Some(el)
    }

    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }
}

/// Group elements two at a time, in order. A trailing odd element becomes a
/// prompt-only unit.
pub fn group_exchanges(elements: &[ElementId]) -> Vec<ExchangeUnit> {
    elements
        .chunks(2)
        .map(|pair| ExchangeUnit {
            prompt: pair[0],
            response: pair.get(1).copied(),
        })
        .collect()
}

/// A unit whose roles don't read as `(user, assistant)`.
///
/// Strict pairing assumes prompts and responses alternate. Tool calls,
/// system notices, or multi-part replies break that assumption; the pairing
/// is kept as-is and the mismatch is only reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingAnomaly {
    pub unit_index: usize,
    pub prompt_role: Option<String>,
    pub response_role: Option<String>,
}

/// Check each unit's roles against the expected alternation. Units whose
/// roles can't be read are not reported.
pub fn find_anomalies(
    doc: &(impl DocumentAdapter + ?Sized),
    units: &[ExchangeUnit],
    role_attr: &str,
) -> Vec<GroupingAnomaly> {
    units
        .iter()
        .enumerate()
        .filter_map(|(unit_index, unit)| {
            let prompt_role = doc.attribute(unit.prompt, role_attr);
            let response_role = unit.response.and_then(|r| doc.attribute(r, role_attr));
            let prompt_ok = prompt_role.as_deref().is_none_or(|r| r == "user");
            let response_ok = response_role.as_deref().is_none_or(|r| r == "assistant");
            (!(prompt_ok && response_ok)).then_some(GroupingAnomaly {
                unit_index,
                prompt_role,
                response_role,
            })
        })
        .collect()
}
