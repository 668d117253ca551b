//! Temporary budget raises when the reader heads for older turns.
//!
//! Two triggers feed the same raise of [`EXPAND_STEP`] units:
//!
//! - **Scroll**: scroll events are debounced; once settled, a position near
//!   the top that was reached by scrolling upward raises the budget. A guard
//!   keeps it from firing again until the reader leaves the top region.
//! - **Intersection**: when no scroll container could be identified, the
//!   oldest visible unit is watched instead, and seeing more than half of it
//!   raises the budget.
//!
//! Raises are never persisted. The engine reverts them when a new exchange
//! arrives (see [`super::watcher`]).

use std::time::{Duration, Instant};

use crate::dom::{DocumentAdapter, ElementId, ScrollMetrics};
use crate::prune::timer::Debouncer;

/// Units added per automatic raise.
pub const EXPAND_STEP: usize = 5;

/// Distance from the top of the scroll container that counts as "near".
pub const NEAR_TOP_PX: f64 = 200.0;

/// Settle time for scroll events.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(150);

/// Visible fraction of the watched element that fires the fallback trigger.
pub const INTERSECTION_THRESHOLD: f64 = 0.5;

/// What caused an automatic raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandTrigger {
    Scroll,
    Intersection,
    Search,
}

impl std::fmt::Display for ExpandTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Scroll => "scroll",
            Self::Intersection => "intersection",
            Self::Search => "search",
        })
    }
}

/// Budget after one step, capped at the unit count. `None` if the step
/// would not reveal anything.
pub fn stepped_budget(effective: usize, unit_count: usize) -> Option<usize> {
    let next = effective.saturating_add(EXPAND_STEP).min(unit_count);
    (next > effective).then_some(next)
}

/// Scroll and intersection bookkeeping.
#[derive(Debug, Clone)]
pub struct AutoExpand {
    scroll: Debouncer,
    last_scroll_top: f64,
    armed: bool,
    observed: Option<ElementId>,
}

impl Default for AutoExpand {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoExpand {
    pub fn new() -> Self {
        Self {
            scroll: Debouncer::new(SCROLL_DEBOUNCE),
            last_scroll_top: 0.0,
            armed: true,
            observed: None,
        }
    }

    /// Record a raw scroll event.
    pub fn on_scroll(&mut self, now: Instant) {
        self.scroll.trigger(now);
    }

    /// Poll the scroll debouncer. Returns `true` when a settled scroll
    /// should raise the budget.
    pub fn poll_scroll(
        &mut self,
        now: Instant,
        metrics: Option<ScrollMetrics>,
        has_hidden: bool,
    ) -> bool {
        if !self.scroll.poll(now) {
            return false;
        }
        let Some(metrics) = metrics else {
            return false;
        };
        let top = metrics.scroll_top;
        let upward = top < self.last_scroll_top;
        self.last_scroll_top = top;

        if top >= NEAR_TOP_PX {
            self.armed = true;
            return false;
        }
        if !(upward && has_hidden && self.armed) {
            return false;
        }
        self.armed = false;
        true
    }

    /// Evaluate an intersection report for `target`. Only the currently
    /// observed element counts, and only when scroll detection is
    /// unavailable.
    pub fn on_intersection(
        &self,
        target: ElementId,
        ratio: f64,
        scroll_available: bool,
        has_hidden: bool,
    ) -> bool {
        !scroll_available
            && has_hidden
            && self.observed == Some(target)
            && ratio > INTERSECTION_THRESHOLD
    }

    /// Point the intersection observer at the oldest visible unit.
    pub fn retarget(&mut self, doc: &mut (impl DocumentAdapter + ?Sized), target: Option<ElementId>) {
        if self.observed != target {
            doc.observe_intersection(target);
            self.observed = target;
        }
    }
}
