//! Reacting to page mutations.
//!
//! Host mutation reports are coalesced: a reaction runs after a short settle
//! delay and never more than once per [`MUTATION_MIN_INTERVAL`]. While the
//! assistant is generating a reply the watcher is paused and reports are
//! dropped; resuming schedules one catch-up reaction.

use std::time::{Duration, Instant};

use crate::prune::timer::Debouncer;

/// Minimum spacing between two reactions.
pub const MUTATION_MIN_INTERVAL: Duration = Duration::from_secs(2);

/// Settle time after the first mutation of a burst.
pub const MUTATION_SETTLE: Duration = Duration::from_millis(500);

/// Controls whose presence means a reply is streaming.
pub const GENERATION_SELECTORS: &[&str] = &[
    r#"button[data-testid="stop-button"]"#,
    r#"button[aria-label="Stop generating"]"#,
    r#"button[aria-label="Stop streaming"]"#,
];

/// What a settled mutation burst calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// A new exchange arrived during an automatic raise: drop the raise.
    Revert,
    /// The unit count changed: prune again.
    Reprune,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct MutationWatcher {
    pending: Debouncer,
    paused: bool,
    last_reaction: Option<Instant>,
    unit_count: usize,
    /// Unit count when the current automatic raise began.
    raised_at: Option<usize>,
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self {
            pending: Debouncer::new(MUTATION_SETTLE),
            paused: false,
            last_reaction: None,
            unit_count: 0,
            raised_at: None,
        }
    }

    /// Record a mutation report. Ignored while paused; otherwise schedules a
    /// reaction unless one is already pending.
    pub fn on_mutation(&mut self, now: Instant) {
        if self.paused || self.pending.is_pending() {
            return;
        }
        let settle = now + MUTATION_SETTLE;
        let deadline = match self.last_reaction {
            Some(last) => settle.max(last + MUTATION_MIN_INTERVAL),
            None => settle,
        };
        self.pending.trigger_at(deadline);
    }

    /// Suspend reactions, discarding anything pending.
    pub fn pause(&mut self) {
        self.paused = true;
        self.pending.cancel();
    }

    /// Resume reactions and schedule a catch-up pass.
    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.on_mutation(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Returns `true` when a scheduled reaction is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.paused || !self.pending.poll(now) {
            return false;
        }
        self.last_reaction = Some(now);
        true
    }

    /// Decide what a due reaction does given the freshly counted units.
    ///
    /// Growth is measured against the count at the start of the raise, so
    /// passes that ran in between (another raise, a badge click) don't hide a
    /// new exchange.
    pub fn react(&mut self, unit_count: usize, auto_expanded: bool) -> Reaction {
        let previous = std::mem::replace(&mut self.unit_count, unit_count);
        let grew = unit_count > self.raised_at.unwrap_or(previous);
        if grew && auto_expanded {
            Reaction::Revert
        } else if unit_count != previous {
            Reaction::Reprune
        } else {
            Reaction::Nothing
        }
    }

    /// Record the unit count seen by a pass the watcher didn't trigger.
    pub fn set_baseline(&mut self, unit_count: usize) {
        self.unit_count = unit_count;
    }

    /// Remember the unit count at the first of a run of automatic raises.
    pub fn mark_raise(&mut self, unit_count: usize) {
        self.raised_at.get_or_insert(unit_count);
    }

    /// Forget the raise once the budget is back to the persisted value.
    pub fn clear_raise(&mut self) {
        self.raised_at = None;
    }
}
