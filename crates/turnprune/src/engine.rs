//! The page-resident engine.
//!
//! [`Engine`] owns every piece of mutable state: settings, budgets, the
//! hidden set, auto-expand and watcher bookkeeping, search state, the badge
//! and all timers. Host events come in through a handful of methods
//! (`on_scroll`, `on_mutation`, `on_intersection`, badge gestures,
//! [`handle`](Engine::handle) for commands) and time advances only through
//! [`tick`](Engine::tick). Every trigger ends in the same
//! [`apply_pruning`](Engine::apply_pruning) pass, so calling it redundantly
//! is always safe.
//!
//! ```ignore
//! let mut engine = Engine::new(doc, MemoryStore::new()).with_handler(LoggingHandler);
//! engine.start(Instant::now());
//! loop {
//!     engine.tick(Instant::now());
//!     // feed host events...
//! }
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{PILL_POSITION_KEY, PillPosition, SETTINGS_KEY, Settings, SettingsStore};
use crate::dom::{DocumentAdapter, ElementId, MarkId, ScrollBehavior};
use crate::events::{EngineEvent, EventHandler, NoopHandler};
use crate::indicator::{BADGE_HEIGHT, BADGE_WIDTH, Indicator, IndicatorView, Modifiers, Viewport};
use crate::protocol::{Command, Response, SearchReply, Stats};
use crate::prune::auto_expand::stepped_budget;
use crate::prune::watcher::GENERATION_SELECTORS;
use crate::prune::{
    AutoExpand, Budgeter, Debouncer, ExchangeUnit, ExpandTrigger, Interval, MessageLocator,
    MutationWatcher, PruneOutcome, Reaction, find_anomalies, group_exchanges,
};
use crate::search::{
    MIN_QUERY_CHARS, SearchAction, SearchError, SearchMatch, SearchOptions, SearchOutcome,
    SearchState, build_pattern, highlight_units,
};

/// Spacing of startup checks while the page has no messages.
pub const STARTUP_PERIOD: Duration = Duration::from_millis(500);
/// Startup checks before giving up.
pub const STARTUP_ATTEMPTS: u32 = 60;
/// Delay before the smooth correction that follows a jump to a match.
pub const FOLLOW_UP_DELAY: Duration = Duration::from_millis(100);
/// How long the current match stays emphasized.
pub const FLASH_DURATION: Duration = Duration::from_millis(1500);

/// Diagnostics gated by the `debugLogs` setting.
macro_rules! trace_engine {
    ($self:ident, $($arg:tt)+) => {
        if $self.settings.debug_logs {
            debug!($($arg)+);
        }
    };
}

pub struct Engine<D: DocumentAdapter> {
    doc: D,
    store: Box<dyn SettingsStore>,
    handler: Box<dyn EventHandler>,
    settings: Settings,
    /// Set once any store call has failed.
    degraded: bool,

    locator: MessageLocator,
    units: Vec<ExchangeUnit>,
    budgeter: Budgeter,
    auto: AutoExpand,
    watcher: MutationWatcher,
    search: SearchState,
    indicator: Indicator,

    ready: bool,
    startup: Interval,
    generating: bool,
    anomalies: usize,

    restore_scroll: Option<f64>,
    follow_up: Debouncer,
    follow_target: Option<ElementId>,
    flash: Debouncer,
    flash_marks: Vec<MarkId>,
}

impl<D: DocumentAdapter> Engine<D> {
    /// Build an engine over `doc`, loading settings and the badge position
    /// from `store`. A failing store leaves defaults in place.
    pub fn new(doc: D, store: impl SettingsStore + 'static) -> Self {
        let mut degraded = false;
        let settings = match store.load(SETTINGS_KEY) {
            Ok(Some(value)) => Settings::from_value(value).unwrap_or_else(|e| {
                warn!("stored settings unreadable, using defaults: {e}");
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("settings store unavailable, running in memory: {e}");
                degraded = true;
                Settings::default()
            }
        };
        let position = match store.load(PILL_POSITION_KEY) {
            Ok(value) => value.and_then(|v| serde_json::from_value::<PillPosition>(v).ok()),
            Err(_) => None,
        };

        Self {
            doc,
            store: Box::new(store),
            handler: Box::new(NoopHandler),
            locator: MessageLocator::from_selectors(&settings.selectors),
            units: Vec::new(),
            budgeter: Budgeter::new(settings.keep_n),
            auto: AutoExpand::new(),
            watcher: MutationWatcher::new(),
            search: SearchState::default(),
            indicator: Indicator::new(position),
            settings,
            degraded,
            ready: false,
            startup: Interval::new(STARTUP_PERIOD, STARTUP_ATTEMPTS),
            generating: false,
            anomalies: 0,
            restore_scroll: None,
            follow_up: Debouncer::new(FOLLOW_UP_DELAY),
            follow_target: None,
            flash: Debouncer::new(FLASH_DURATION),
            flash_marks: Vec::new(),
        }
    }

    /// Set the event handler.
    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    // ── Accessors ──

    pub fn doc(&self) -> &D {
        &self.doc
    }

    /// Mutable access to the page, for hosts that simulate changes. Report
    /// the change afterwards with [`on_mutation`](Self::on_mutation).
    pub fn doc_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn persisted_budget(&self) -> usize {
        self.budgeter.budget.persisted()
    }

    pub fn effective_budget(&self) -> usize {
        self.budgeter.budget.effective()
    }

    pub fn is_auto_expanded(&self) -> bool {
        self.budgeter.budget.is_auto_expanded()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Units computed by the last pruning pass.
    pub fn units(&self) -> &[ExchangeUnit] {
        &self.units
    }

    pub fn hidden_elements(&self) -> Vec<ElementId> {
        self.budgeter.hidden().iter().collect()
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    // ── Lifecycle ──

    /// Look for messages. Prunes right away if any are found; otherwise
    /// keeps probing from [`tick`](Self::tick).
    pub fn start(&mut self, now: Instant) {
        trace_engine!(self, "starting with keepN={}", self.settings.keep_n);
        if !self.look_for_messages() {
            self.refresh_indicator();
            self.startup.start(now);
        }
    }

    /// Advance every timer to `now`.
    pub fn tick(&mut self, now: Instant) {
        if let Some(attempt) = self.startup.poll(now) {
            if self.look_for_messages() {
                self.startup.stop();
            } else {
                trace_engine!(self, "attempt {attempt}: no messages yet");
                self.refresh_indicator();
                if !self.startup.is_running() {
                    info!("no messages found after {attempt} attempts");
                    self.emit(EngineEvent::StartupAbandoned { attempts: attempt });
                }
            }
        }

        if let Some(top) = self.restore_scroll.take() {
            self.doc.set_scroll_top(top);
        }

        if !self.ready {
            return;
        }

        let has_hidden = !self.budgeter.hidden().is_empty();
        if self
            .auto
            .poll_scroll(now, self.doc.scroll_metrics(), has_hidden)
        {
            trace_engine!(self, "scrolled to top, auto-expanding");
            self.auto_raise(ExpandTrigger::Scroll);
        }

        if self.watcher.poll(now) {
            self.react_to_mutations();
        }

        if self.follow_up.poll(now)
            && let Some(target) = self.follow_target.take()
        {
            self.doc.scroll_into_view(target, ScrollBehavior::Smooth);
        }

        if self.flash.poll(now) {
            for mark in std::mem::take(&mut self.flash_marks) {
                self.doc.set_mark_active(mark, false);
            }
        }
    }

    fn look_for_messages(&mut self) -> bool {
        let located = self.locator.locate(&self.doc);
        let Some(matcher) = located.matcher.clone() else {
            return false;
        };
        self.ready = true;
        let outcome = self.apply_pruning();
        info!(matcher = %matcher, "ready: found {} messages", located.elements.len());
        self.emit(EngineEvent::Ready {
            units: outcome.total_units,
            matcher: &matcher,
        });
        true
    }

    // ── Pruning ──

    fn locate_units(&self) -> Vec<ExchangeUnit> {
        group_exchanges(&self.locator.locate(&self.doc).elements)
    }

    /// Recompute units, unhide everything, hide the oldest units beyond the
    /// effective budget, and refresh the badge. The scroll offset is put
    /// back on the next tick.
    pub fn apply_pruning(&mut self) -> PruneOutcome {
        self.units = self.locate_units();
        self.report_anomalies();

        let before = self.doc.scroll_metrics().map(|m| m.scroll_top);
        let outcome = self.budgeter.apply(&mut self.doc, &self.units);
        // Keep the position from before the first of several back-to-back
        // passes.
        if self.restore_scroll.is_none() {
            self.restore_scroll = before;
        }

        trace_engine!(
            self,
            "pruning: {} exchanges, keeping {}, hid {}",
            outcome.total_units,
            self.budgeter.budget.effective(),
            outcome.hidden_units
        );

        self.watcher.set_baseline(self.units.len());
        if !self.is_auto_expanded() {
            self.watcher.clear_raise();
        }
        let top = self.budgeter.topmost_visible(&self.units);
        self.auto.retarget(&mut self.doc, top);
        self.refresh_indicator();
        self.emit(EngineEvent::Pruned {
            stats: Stats {
                visible: outcome.visible_units,
                archived: outcome.hidden_units,
                total: outcome.total_units,
            },
            effective: self.budgeter.budget.effective(),
        });
        outcome
    }

    fn report_anomalies(&mut self) {
        let found = find_anomalies(&self.doc, &self.units, &self.settings.selectors.role_attr);
        if found.len() != self.anomalies
            && let Some(first) = found.first()
        {
            warn!(
                count = found.len(),
                unit = first.unit_index,
                prompt_role = ?first.prompt_role,
                response_role = ?first.response_role,
                "exchanges do not alternate user/assistant; pairing kept as-is"
            );
        }
        self.anomalies = found.len();
    }

    /// Set the budget. Manual changes (and any change while no raise is
    /// active) are saved; otherwise only the effective budget moves.
    pub fn set_budget(&mut self, n: usize, manual: bool) {
        if let Some(saved) = self.budgeter.budget.set(n, manual) {
            self.settings.keep_n = saved;
            self.persist_settings();
        }
        trace_engine!(
            self,
            "keepN set to {}{}",
            self.budgeter.budget.effective(),
            if self.is_auto_expanded() { " (auto-expanded)" } else { "" }
        );
        self.emit(EngineEvent::BudgetChanged {
            persisted: self.budgeter.budget.persisted(),
            effective: self.budgeter.budget.effective(),
            manual,
        });
        self.apply_pruning();
    }

    fn raise_to(&mut self, n: usize, trigger: ExpandTrigger) -> bool {
        let from = self.budgeter.budget.effective();
        if !self.budgeter.budget.raise_to(n) {
            return false;
        }
        self.emit(EngineEvent::AutoExpanded {
            trigger,
            from,
            to: n,
        });
        self.apply_pruning();
        self.watcher.mark_raise(self.units.len());
        true
    }

    fn auto_raise(&mut self, trigger: ExpandTrigger) -> bool {
        let total = self.locate_units().len();
        match stepped_budget(self.budgeter.budget.effective(), total) {
            Some(n) => self.raise_to(n, trigger),
            None => false,
        }
    }

    fn revert(&mut self) {
        if self.budgeter.budget.revert() {
            let to = self.budgeter.budget.persisted();
            trace_engine!(self, "new exchange detected, resetting keepN to {to}");
            self.emit(EngineEvent::Reverted { to });
        }
        self.apply_pruning();
    }

    // ── Host events ──

    /// The conversation's scroll container moved.
    pub fn on_scroll(&mut self, now: Instant) {
        if self.ready {
            self.auto.on_scroll(now);
        }
    }

    /// The observed element's visible fraction changed.
    pub fn on_intersection(&mut self, target: ElementId, ratio: f64) {
        if !self.ready {
            return;
        }
        let fire = self.auto.on_intersection(
            target,
            ratio,
            self.doc.scroll_metrics().is_some(),
            !self.budgeter.hidden().is_empty(),
        );
        if fire {
            trace_engine!(self, "oldest visible exchange in view, auto-expanding");
            self.auto_raise(ExpandTrigger::Intersection);
        }
    }

    /// The page's structure changed.
    pub fn on_mutation(&mut self, now: Instant) {
        if !self.ready {
            return;
        }
        let generating = GENERATION_SELECTORS.iter().any(|sel| {
            self.doc
                .query_selector_all(sel)
                .is_ok_and(|found| !found.is_empty())
        });
        match (generating, self.generating) {
            (true, false) => {
                self.generating = true;
                self.watcher.pause();
                self.emit(EngineEvent::GenerationPaused);
            }
            (false, true) => {
                self.generating = false;
                self.watcher.resume(now);
                self.emit(EngineEvent::GenerationResumed);
            }
            _ => self.watcher.on_mutation(now),
        }
    }

    fn react_to_mutations(&mut self) {
        let count = self.locate_units().len();
        match self.watcher.react(count, self.is_auto_expanded()) {
            Reaction::Revert => self.revert(),
            Reaction::Reprune => {
                self.apply_pruning();
            }
            Reaction::Nothing => {}
        }
    }

    // ── Badge ──

    /// Click on the badge: +5, or −5 with shift. Always a manual change.
    pub fn indicator_click(&mut self, modifiers: Modifiers) {
        if self.indicator.is_dragging() {
            return;
        }
        let n = Indicator::click_budget(modifiers, self.budgeter.budget.effective());
        self.set_budget(n, true);
    }

    /// Press on the badge. Returns `true` if a drag started.
    pub fn indicator_drag_start(
        &mut self,
        x: f64,
        y: f64,
        modifiers: Modifiers,
        viewport: Viewport,
    ) -> bool {
        let default_corner = PillPosition {
            x: (viewport.width - BADGE_WIDTH - 20.0).max(0.0),
            y: (viewport.height - BADGE_HEIGHT - 20.0).max(0.0),
        };
        self.indicator.drag_start(x, y, modifiers, default_corner)
    }

    pub fn indicator_drag_move(&mut self, x: f64, y: f64, viewport: Viewport) {
        if self.indicator.drag_move(x, y, viewport).is_some() {
            self.refresh_indicator();
        }
    }

    /// Release the badge, saving its position if it moved.
    pub fn indicator_drag_end(&mut self) {
        if let Some(pos) = self.indicator.drag_end() {
            match serde_json::to_value(pos) {
                Ok(value) => self.persist(PILL_POSITION_KEY, value),
                Err(e) => warn!("badge position not serializable: {e}"),
            }
        }
    }

    fn refresh_indicator(&mut self) {
        if !self.settings.pill_enabled {
            self.doc.render_indicator(None);
            return;
        }
        let total = self.units.len();
        let visible = self.budgeter.visible_units(&self.units);
        let dark = self.settings.theme.is_dark(self.doc.prefers_dark());
        let view = IndicatorView::compose(
            visible,
            total,
            total - visible,
            dark,
            self.indicator.position(),
        );
        self.doc.render_indicator(Some(&view));
    }

    // ── Search ──

    /// Run, repeat or step a search.
    ///
    /// A new `(query, options)` pair replaces all highlights, force-reveals
    /// every matching exchange and jumps to the first match. The same pair
    /// again, or `next`/`prev`, moves the cursor. Invalid input returns an
    /// error and leaves the page untouched.
    pub fn search(
        &mut self,
        query: &str,
        action: SearchAction,
        options: SearchOptions,
        now: Instant,
    ) -> Result<SearchOutcome, SearchError> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(SearchError::QueryTooShort);
        }
        if self.search.is_current(query, &options) {
            let step = match action {
                SearchAction::Prev => SearchAction::Prev,
                _ => SearchAction::Next,
            };
            return Ok(self.search_step(step, now));
        }

        let pattern = build_pattern(query, options.use_regex)?;
        self.clear_highlights();

        let units = self.locate_units();
        let matches = highlight_units(
            &mut self.doc,
            &units,
            &pattern,
            options.filter,
            &self.settings.selectors.role_attr,
        );
        trace_engine!(
            self,
            "searching for {query:?} in {} exchanges: {} matches",
            units.len(),
            matches.len()
        );

        if let Some(oldest) = matches.iter().map(|m| m.unit_index).min() {
            self.raise_to(units.len() - oldest, ExpandTrigger::Search);
        }
        self.search.reset(query.to_string(), options, matches);
        if let Some(current) = self.search.current() {
            self.focus_match(None, current, now);
        }

        let outcome = self.search.outcome();
        self.emit(EngineEvent::SearchUpdated { query, outcome });
        Ok(outcome)
    }

    /// Move to the next or previous match. A no-op returning empty counts
    /// when nothing matched.
    pub fn search_step(&mut self, action: SearchAction, now: Instant) -> SearchOutcome {
        if let Some((previous, current)) = self.search.step(action) {
            self.focus_match(previous, current, now);
        }
        let outcome = self.search.outcome();
        if let Some((query, _)) = self.search_query() {
            self.emit(EngineEvent::SearchUpdated {
                query: &query,
                outcome,
            });
        }
        outcome
    }

    fn search_query(&self) -> Option<(String, SearchOptions)> {
        self.search
            .query()
            .map(|(q, o)| (q.to_string(), o.clone()))
    }

    /// Remove highlights and forget the search. Leaves the hidden set alone.
    pub fn clear_search(&mut self) {
        self.clear_highlights();
        self.search.clear();
        self.emit(EngineEvent::SearchCleared);
    }

    fn clear_highlights(&mut self) {
        self.doc.unwrap_all_marks();
        self.follow_up.cancel();
        self.follow_target = None;
        self.flash.cancel();
        self.flash_marks.clear();
    }

    fn focus_match(&mut self, previous: Option<SearchMatch>, current: SearchMatch, now: Instant) {
        if let Some(prev) = previous {
            for &mark in &prev.marks {
                self.doc.set_mark_active(mark, false);
            }
        }

        if self.budgeter.hidden().contains(current.element) {
            let units = self.locate_units();
            if let Some(idx) = units.iter().position(|u| u.contains(current.element)) {
                self.raise_to(units.len() - idx, ExpandTrigger::Search);
            }
        }

        for &mark in &current.marks {
            self.doc.set_mark_active(mark, true);
        }
        self.doc
            .scroll_into_view(current.element, ScrollBehavior::Instant);
        self.restore_scroll = None;
        self.follow_target = Some(current.element);
        self.follow_up.trigger(now);
        self.flash_marks = current.marks;
        self.flash.trigger(now);
    }

    // ── Commands ──

    /// Answer a protocol command. Never fails: errors travel in the
    /// response.
    pub fn handle(&mut self, command: Command, now: Instant) -> Response {
        trace_engine!(self, "received command: {command:?}");
        match command {
            Command::Ping => Response::ok(),
            Command::ApplySettings => {
                self.reload_settings();
                Response::ok()
            }
            Command::GetStats => Response::Stats(self.stats()),
            Command::SearchArchive {
                query,
                action,
                use_regex,
                filter,
            } => {
                let options = SearchOptions { use_regex, filter };
                Response::Search(match self.search(&query, action, options, now) {
                    Ok(outcome) => outcome.into(),
                    Err(e) => {
                        debug!("search rejected: {e}");
                        e.into()
                    }
                })
            }
            Command::SearchNext => {
                Response::Search(SearchReply::from(self.search_step(SearchAction::Next, now)))
            }
            Command::SearchPrev => {
                Response::Search(SearchReply::from(self.search_step(SearchAction::Prev, now)))
            }
            Command::ClearSearch => {
                self.clear_search();
                Response::ok()
            }
            Command::GetAllMessagesForExport => Response::Messages {
                messages: self.export_messages(),
            },
            Command::RefreshPrompt => {
                if self.doc.confirm_reload() {
                    info!("reload accepted");
                }
                Response::ok()
            }
            Command::SetBudget { keep_n } => {
                self.set_budget(keep_n, true);
                Response::ok()
            }
            Command::Other => Response::ok(),
        }
    }

    /// Exchange counts over the page as it is now. Exchanges that arrived
    /// since the last pass count as visible.
    pub fn stats(&self) -> Stats {
        let units = self.locate_units();
        let visible = self.budgeter.visible_units(&units);
        Stats {
            visible,
            archived: units.len() - visible,
            total: units.len(),
        }
    }

    /// Text of every message, oldest first, hidden or not.
    pub fn export_messages(&self) -> Vec<String> {
        self.locator
            .locate(&self.doc)
            .elements
            .into_iter()
            .map(|el| self.doc.text_content(el).trim().to_string())
            .collect()
    }

    /// Reload settings from the store and prune with the stored budget.
    pub fn reload_settings(&mut self) {
        match self.store.load(SETTINGS_KEY) {
            Ok(Some(value)) => match Settings::from_value(value) {
                Ok(settings) => self.settings = settings,
                Err(e) => warn!("stored settings unreadable, keeping current: {e}"),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("settings store unavailable, keeping current settings: {e}");
                self.degraded = true;
            }
        }
        trace_engine!(self, "settings loaded: {:?}", self.settings);
        self.locator = MessageLocator::from_selectors(&self.settings.selectors);
        self.budgeter.budget.reset(self.settings.keep_n);
        self.emit(EngineEvent::BudgetChanged {
            persisted: self.budgeter.budget.persisted(),
            effective: self.budgeter.budget.effective(),
            manual: false,
        });
        self.apply_pruning();
    }

    // ── Persistence ──

    fn persist_settings(&mut self) {
        match serde_json::to_value(&self.settings) {
            Ok(value) => self.persist(SETTINGS_KEY, value),
            Err(e) => warn!("settings not serializable: {e}"),
        }
    }

    fn persist(&mut self, key: &str, value: serde_json::Value) {
        if let Err(e) = self.store.save(key, value) {
            self.degraded = true;
            let error = e.to_string();
            self.emit(EngineEvent::PersistFailed { key, error: &error });
        }
    }

    fn emit(&self, event: EngineEvent<'_>) {
        self.handler.on_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::dom::MemoryDocument;

    fn engine_with(turns: usize, keep_n: usize) -> Engine<MemoryDocument> {
        let mut doc = MemoryDocument::new();
        for i in 0..turns {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            doc.append_turn(role, &format!("message {i} about the topic"));
        }
        let store = MemoryStore::new()
            .with_entry(SETTINGS_KEY, serde_json::json!({"keepN": keep_n}));
        Engine::new(doc, store)
    }

    #[test]
    fn start_prunes_when_messages_exist() {
        let mut e = engine_with(12, 5);
        e.start(Instant::now());
        assert!(e.is_ready());
        assert_eq!(
            e.stats(),
            Stats {
                visible: 5,
                archived: 1,
                total: 6
            }
        );
        let view = e.doc().indicator().unwrap();
        assert_eq!(view.label, "5 visible / 6 total");
    }

    #[test]
    fn startup_check_gives_up_after_budget() {
        let t0 = Instant::now();
        let mut e = engine_with(0, 5);
        e.start(t0);
        assert!(!e.is_ready());
        assert_eq!(e.doc().indicator().unwrap().label, "No messages found");
        for i in 1..=STARTUP_ATTEMPTS {
            e.tick(t0 + STARTUP_PERIOD * i);
        }
        assert!(!e.is_ready());
        e.doc_mut().append_turn("user", "a late question here");
        e.tick(t0 + STARTUP_PERIOD * (STARTUP_ATTEMPTS + 5));
        assert!(!e.is_ready());
    }

    #[test]
    fn late_messages_are_picked_up_by_startup_check() {
        let t0 = Instant::now();
        let mut e = engine_with(0, 5);
        e.start(t0);
        e.doc_mut().append_turn("user", "a late question here");
        e.tick(t0 + STARTUP_PERIOD);
        assert!(e.is_ready());
    }

    #[test]
    fn disabled_badge_is_removed() {
        let doc = MemoryDocument::new();
        let store = MemoryStore::new()
            .with_entry(SETTINGS_KEY, serde_json::json!({"pillEnabled": false}));
        let mut e = Engine::new(doc, store);
        e.start(Instant::now());
        assert!(e.doc().indicator().is_none());
    }

    #[test]
    fn scroll_is_restored_on_next_tick() {
        let t0 = Instant::now();
        let mut e = engine_with(20, 10);
        e.start(t0);
        e.tick(t0);
        e.doc_mut().set_scroll_top(1000.0);
        e.set_budget(6, true);
        // Layout shrank: the document clamps the offset.
        assert_eq!(e.doc().scroll_metrics().unwrap().scroll_top, 640.0);
        e.set_budget(10, true);
        e.tick(t0);
        assert_eq!(e.doc().scroll_metrics().unwrap().scroll_top, 1000.0);
    }

    #[test]
    fn shift_click_lowers_budget_with_floor() {
        let mut e = engine_with(12, 3);
        e.start(Instant::now());
        e.indicator_click(Modifiers::shift());
        assert_eq!(e.persisted_budget(), 1);
        e.indicator_click(Modifiers::default());
        assert_eq!(e.persisted_budget(), 6);
        assert_eq!(e.stats().visible, 6);
    }

    #[test]
    fn click_at_largest_budget_saturates() {
        let mut e = engine_with(12, usize::MAX);
        e.start(Instant::now());
        e.indicator_click(Modifiers::default());
        assert_eq!(e.persisted_budget(), usize::MAX);
        assert_eq!(e.stats().visible, 6);
    }
}
