//! Visibility budgeting: which exchanges stay on screen.
//!
//! Two budgets coexist. The **persisted** budget is the user's saved choice;
//! the **effective** budget is what pruning actually uses and may be raised
//! temporarily (auto-expand, search) without touching the saved value. The
//! effective budget never drops below the persisted one.
//!
//! Pruning is all-or-nothing per unit and always runs as one pass: unhide
//! everything previously hidden, then hide the oldest units beyond the
//! budget. Running it twice with no page change yields the same hidden set.

use std::collections::BTreeSet;

use crate::dom::{DocumentAdapter, ElementId};
use crate::prune::grouper::ExchangeUnit;

/// Smallest legal budget.
pub const MIN_BUDGET: usize = 1;

/// Persisted and effective budgets plus the auto-expand flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityBudget {
    persisted: usize,
    effective: usize,
    auto_expanded: bool,
}

impl VisibilityBudget {
    pub fn new(keep_n: usize) -> Self {
        let n = keep_n.max(MIN_BUDGET);
        Self {
            persisted: n,
            effective: n,
            auto_expanded: false,
        }
    }

    pub fn persisted(&self) -> usize {
        self.persisted
    }

    pub fn effective(&self) -> usize {
        self.effective
    }

    pub fn is_auto_expanded(&self) -> bool {
        self.auto_expanded
    }

    /// Set the budget.
    ///
    /// A manual change, or any change while not auto-expanded, becomes the
    /// new persisted budget and clears the auto flag; the returned value is
    /// what must be saved. Otherwise only the effective budget moves (never
    /// below the persisted one) and `None` is returned.
    pub fn set(&mut self, n: usize, manual: bool) -> Option<usize> {
        let n = n.max(MIN_BUDGET);
        if manual || !self.auto_expanded {
            self.persisted = n;
            self.effective = n;
            self.auto_expanded = false;
            Some(n)
        } else {
            self.effective = n.max(self.persisted);
            None
        }
    }

    /// Temporarily raise the effective budget to `n`, flagging the raise as
    /// automatic. Returns `false` if `n` would not raise it.
    pub fn raise_to(&mut self, n: usize) -> bool {
        if n <= self.effective {
            return false;
        }
        self.effective = n;
        self.auto_expanded = true;
        true
    }

    /// Drop an automatic raise, returning to the persisted budget. Returns
    /// `false` if nothing was raised.
    pub fn revert(&mut self) -> bool {
        if !self.auto_expanded {
            return false;
        }
        self.effective = self.persisted;
        self.auto_expanded = false;
        true
    }

    /// Adopt a freshly loaded persisted budget, discarding any raise.
    pub fn reset(&mut self, keep_n: usize) {
        *self = Self::new(keep_n);
    }
}

/// Elements currently suppressed from layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenSet(BTreeSet<ElementId>);

impl HiddenSet {
    pub fn contains(&self, el: ElementId) -> bool {
        self.0.contains(&el)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.0.iter().copied()
    }

    /// A unit is visible iff at least one of its elements is not hidden.
    pub fn unit_visible(&self, unit: &ExchangeUnit) -> bool {
        unit.elements().any(|el| !self.contains(el))
    }
}

/// Counts after a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub total_units: usize,
    pub visible_units: usize,
    pub hidden_units: usize,
    pub hidden_elements: usize,
}

/// The budget and the hidden set it produces.
#[derive(Debug, Clone)]
pub struct Budgeter {
    pub budget: VisibilityBudget,
    hidden: HiddenSet,
}

impl Budgeter {
    pub fn new(keep_n: usize) -> Self {
        Self {
            budget: VisibilityBudget::new(keep_n),
            hidden: HiddenSet::default(),
        }
    }

    pub fn hidden(&self) -> &HiddenSet {
        &self.hidden
    }

    /// Unhide everything, then hide the oldest `units.len() - effective`
    /// units. One synchronous pass.
    pub fn apply(
        &mut self,
        doc: &mut (impl DocumentAdapter + ?Sized),
        units: &[ExchangeUnit],
    ) -> PruneOutcome {
        for el in std::mem::take(&mut self.hidden.0) {
            doc.set_visibility(el, true);
        }

        let keep = self.budget.effective().max(MIN_BUDGET);
        let cut = units.len().saturating_sub(keep);
        for unit in &units[..cut] {
            for el in unit.elements() {
                doc.set_visibility(el, false);
                self.hidden.0.insert(el);
            }
        }

        PruneOutcome {
            total_units: units.len(),
            visible_units: units.len() - cut,
            hidden_units: cut,
            hidden_elements: self.hidden.len(),
        }
    }

    /// First element of the oldest visible unit.
    pub fn topmost_visible(&self, units: &[ExchangeUnit]) -> Option<ElementId> {
        units
            .iter()
            .find(|u| self.hidden.unit_visible(u))
            .map(|u| u.prompt)
    }

    /// Number of visible units among `units`.
    pub fn visible_units(&self, units: &[ExchangeUnit]) -> usize {
        units.iter().filter(|u| self.hidden.unit_visible(u)).count()
    }
}
