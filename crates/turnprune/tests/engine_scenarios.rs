//! End-to-end engine behavior against the in-memory document.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use turnprune::config::{FileStore, MemoryStore, PillPosition, SETTINGS_KEY, SettingsStore};
use turnprune::dom::{DocumentAdapter, MemoryDocument};
use turnprune::engine::Engine;
use turnprune::events::{EngineEvent, FnEventHandler};
use turnprune::indicator::{Modifiers, Viewport};
use turnprune::prune::{EXPAND_STEP, ExpandTrigger};
use turnprune::protocol::{Command, Response, Stats};
use turnprune::search::{RoleFilter, SearchAction, SearchError, SearchOptions};

type Log = Arc<Mutex<Vec<String>>>;

fn doc_with(turns: usize) -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    for i in 0..turns {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        doc.append_turn(role, &format!("message {i} about the topic"));
    }
    doc
}

fn recording(
    doc: MemoryDocument,
    store: impl SettingsStore + 'static,
) -> (Engine<MemoryDocument>, Log) {
    let log: Log = Arc::default();
    let sink = log.clone();
    let engine = Engine::new(doc, store).with_handler(FnEventHandler::new(move |event| {
        let name = match event {
            EngineEvent::Ready { .. } => "ready",
            EngineEvent::StartupAbandoned { .. } => "abandoned",
            EngineEvent::Pruned { .. } => "pruned",
            EngineEvent::BudgetChanged { .. } => "budget",
            EngineEvent::AutoExpanded { trigger, .. } => match trigger {
                ExpandTrigger::Scroll => "expand:scroll",
                ExpandTrigger::Intersection => "expand:intersection",
                ExpandTrigger::Search => "expand:search",
            },
            EngineEvent::Reverted { .. } => "reverted",
            EngineEvent::GenerationPaused => "paused",
            EngineEvent::GenerationResumed => "resumed",
            EngineEvent::SearchUpdated { .. } => "search",
            EngineEvent::SearchCleared => "cleared",
            EngineEvent::PersistFailed { .. } => "persist-failed",
        };
        sink.lock().unwrap().push(name.to_string());
    }));
    (engine, log)
}

fn engine(turns: usize, keep_n: usize) -> (Engine<MemoryDocument>, Log) {
    let store = MemoryStore::new().with_entry(SETTINGS_KEY, serde_json::json!({"keepN": keep_n}));
    recording(doc_with(turns), store)
}

fn count(log: &Log, name: &str) -> usize {
    log.lock().unwrap().iter().filter(|n| *n == name).count()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Scroll down, then back to the top, letting each gesture settle.
fn scroll_to_top(e: &mut Engine<MemoryDocument>, from: f64, at: Instant) -> Instant {
    e.doc_mut().set_scroll_top(from);
    e.on_scroll(at);
    e.tick(at + ms(150));
    e.doc_mut().set_scroll_top(0.0);
    e.on_scroll(at + ms(500));
    e.tick(at + ms(650));
    at + ms(650)
}

// ── Budget ──

#[test]
fn twelve_messages_keep_five_scroll_raises_to_unit_count() {
    let t0 = Instant::now();
    let (mut e, log) = engine(12, 5);
    e.start(t0);
    e.tick(t0);

    assert_eq!(
        e.stats(),
        Stats {
            visible: 5,
            archived: 1,
            total: 6
        }
    );
    let oldest = e.units()[0];
    assert!(oldest.elements().all(|el| !e.doc().is_visible(el)));
    assert!(e.units()[1..]
        .iter()
        .flat_map(|u| u.elements())
        .all(|el| e.doc().is_visible(el)));

    // 10 visible turns of 120px in an 800px viewport: 400px of travel.
    scroll_to_top(&mut e, 400.0, t0 + ms(1000));

    assert_eq!(e.effective_budget(), 6);
    assert_eq!(e.persisted_budget(), 5);
    assert!(e.is_auto_expanded());
    assert_eq!(e.stats().archived, 0);
    assert_eq!(count(&log, "expand:scroll"), 1);
}

#[test]
fn scroll_guard_allows_one_raise_per_visit_to_the_top() {
    let t0 = Instant::now();
    let (mut e, log) = engine(40, 5);
    e.start(t0);
    e.tick(t0);

    let t1 = scroll_to_top(&mut e, 400.0, t0 + ms(1000));
    assert_eq!(e.effective_budget(), 5 + EXPAND_STEP);

    // Still at the top: more scroll events don't raise again.
    e.on_scroll(t1 + ms(100));
    e.tick(t1 + ms(300));
    assert_eq!(e.effective_budget(), 5 + EXPAND_STEP);

    scroll_to_top(&mut e, 600.0, t1 + ms(1000));
    assert_eq!(e.effective_budget(), 5 + 2 * EXPAND_STEP);
    assert_eq!(count(&log, "expand:scroll"), 2);
    assert_eq!(e.persisted_budget(), 5);
}

#[test]
fn pruning_hides_exactly_the_oldest_units() {
    let (mut e, _) = engine(12, 5);
    e.start(Instant::now());
    for n in 1..=8 {
        e.set_budget(n, true);
        let visible = n.min(6);
        assert_eq!(
            e.stats(),
            Stats {
                visible,
                archived: 6 - visible,
                total: 6
            },
            "keepN={n}"
        );
        let hidden_units = 6 - visible;
        for (i, unit) in e.units().iter().enumerate() {
            let shown = i >= hidden_units;
            assert!(
                unit.elements().all(|el| e.doc().is_visible(el) == shown),
                "keepN={n} unit={i}"
            );
        }
        assert_eq!(e.hidden_elements().len(), hidden_units * 2);
    }
}

#[test]
fn pruning_twice_yields_the_same_hidden_set() {
    let (mut e, _) = engine(15, 3);
    e.start(Instant::now());
    let first = e.hidden_elements();
    let outcome = e.apply_pruning();
    assert_eq!(e.hidden_elements(), first);
    assert_eq!(outcome.hidden_units, 5);
    assert_eq!(outcome.hidden_elements, 10);
}

#[test]
fn odd_message_count_leaves_a_single_element_unit() {
    let (mut e, _) = engine(7, 1);
    e.start(Instant::now());
    assert_eq!(e.units().len(), 4);
    let last = e.units()[3];
    assert!(last.is_pending());
    assert_eq!(last.elements().count(), 1);
    assert!(e.doc().is_visible(last.prompt));
    assert_eq!(e.hidden_elements().len(), 6);
}

#[test]
fn manual_budget_is_saved_but_raises_are_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let (mut e, _) = recording(doc_with(30), FileStore::new(&path));
    let t0 = Instant::now();
    e.start(t0);
    e.tick(t0);

    e.set_budget(8, true);
    e.tick(t0 + ms(10));
    let saved = || FileStore::new(&path).load(SETTINGS_KEY).unwrap().unwrap()["keepN"].clone();
    assert_eq!(saved(), 8);
    assert_eq!(e.persisted_budget(), 8);

    scroll_to_top(&mut e, 400.0, t0 + ms(1000));
    assert_eq!(e.effective_budget(), 13);
    assert_eq!(e.persisted_budget(), 8);
    assert_eq!(saved(), 8);
}

// ── Badge ──

#[test]
fn alt_drag_moves_the_badge_and_position_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let vp = Viewport {
        width: 1000.0,
        height: 600.0,
    };
    let (mut e, _) = recording(doc_with(12).with_dark_scheme(true), FileStore::new(&path));
    e.start(Instant::now());
    assert!(e.doc().indicator().unwrap().dark);

    assert!(!e.indicator_drag_start(850.0, 554.0, Modifiers::default(), vp));
    // The badge starts in the bottom-right corner at (840, 544).
    assert!(e.indicator_drag_start(850.0, 554.0, Modifiers::alt(), vp));
    e.indicator_drag_move(110.0, 60.0, vp);
    let moved = PillPosition { x: 100.0, y: 50.0 };
    assert_eq!(e.doc().indicator().unwrap().position, Some(moved));

    // Clicks don't change the budget mid-drag.
    e.indicator_click(Modifiers::default());
    assert_eq!(e.persisted_budget(), 5);
    e.indicator_drag_end();

    let (mut reloaded, _) = recording(doc_with(12), FileStore::new(&path));
    reloaded.start(Instant::now());
    let view = reloaded.doc().indicator().unwrap();
    assert_eq!(view.position, Some(moved));
    assert!(!view.dark);
}

// ── Reversion and generation ──

#[test]
fn new_exchange_reverts_a_raise_exactly_once() {
    let t0 = Instant::now();
    let (mut e, log) = engine(12, 5);
    e.start(t0);
    e.tick(t0);
    let t1 = scroll_to_top(&mut e, 400.0, t0 + ms(1000));
    assert!(e.is_auto_expanded());

    e.doc_mut().append_turn("user", "one more question");
    e.doc_mut().append_turn("assistant", "one more answer");
    e.on_mutation(t1);
    e.tick(t1 + ms(500));

    assert!(!e.is_auto_expanded());
    assert_eq!(e.effective_budget(), 5);
    assert_eq!(
        e.stats(),
        Stats {
            visible: 5,
            archived: 2,
            total: 7
        }
    );
    assert_eq!(count(&log, "reverted"), 1);

    // Nothing new arrived: no second reversion.
    e.on_mutation(t1 + ms(600));
    e.tick(t1 + ms(3000));
    e.doc_mut().append_turn("user", "and another");
    e.on_mutation(t1 + ms(3100));
    e.tick(t1 + ms(6000));
    assert_eq!(count(&log, "reverted"), 1);
    assert_eq!(e.stats().total, 8);
}

/// Leave the top and come back before the watcher's settle delay runs out.
fn quick_second_raise(e: &mut Engine<MemoryDocument>, at: Instant) {
    // Let the restore from the previous pass land first.
    e.tick(at);
    e.doc_mut().set_scroll_top(600.0);
    e.on_scroll(at + ms(10));
    e.tick(at + ms(160));
    e.doc_mut().set_scroll_top(0.0);
    e.on_scroll(at + ms(200));
    e.tick(at + ms(350));
}

#[test]
fn raise_between_exchange_and_reaction_still_reverts() {
    let t0 = Instant::now();
    let (mut e, log) = engine(40, 5);
    e.start(t0);
    e.tick(t0);
    let t1 = scroll_to_top(&mut e, 400.0, t0 + ms(1000));
    assert_eq!(e.effective_budget(), 10);

    e.doc_mut().append_turn("user", "one more question");
    e.doc_mut().append_turn("assistant", "one more answer");
    e.on_mutation(t1);
    quick_second_raise(&mut e, t1);
    assert_eq!(e.effective_budget(), 15);
    assert_eq!(count(&log, "reverted"), 0);

    e.tick(t1 + ms(5000));
    assert!(!e.is_auto_expanded());
    assert_eq!(e.effective_budget(), 5);
    assert_eq!(e.persisted_budget(), 5);
    assert_eq!(count(&log, "reverted"), 1);
}

#[test]
fn exchange_during_generation_reverts_after_resume() {
    let t0 = Instant::now();
    let (mut e, log) = engine(40, 5);
    e.start(t0);
    e.tick(t0);
    let t1 = scroll_to_top(&mut e, 400.0, t0 + ms(1000));

    e.doc_mut().set_generating(true);
    e.on_mutation(t1);
    assert!(e.is_generating());
    e.doc_mut().append_turn("user", "asked while streaming");
    e.doc_mut().append_turn("assistant", "streamed reply text");
    e.on_mutation(t1 + ms(50));
    quick_second_raise(&mut e, t1 + ms(100));
    assert_eq!(e.effective_budget(), 15);

    e.doc_mut().set_generating(false);
    e.on_mutation(t1 + ms(2000));
    e.tick(t1 + ms(3000));
    assert_eq!(e.effective_budget(), 5);
    assert_eq!(count(&log, "reverted"), 1);
}

#[test]
fn mutation_reactions_pause_while_generating() {
    let t0 = Instant::now();
    let (mut e, log) = engine(10, 2);
    e.start(t0);

    e.doc_mut().set_generating(true);
    e.on_mutation(t0);
    assert!(e.is_generating());

    e.doc_mut().append_turn("user", "asked while streaming");
    e.on_mutation(t0 + ms(100));
    e.tick(t0 + ms(5000));
    assert_eq!(e.units().len(), 5);

    e.doc_mut().set_generating(false);
    e.on_mutation(t0 + ms(6000));
    assert!(!e.is_generating());
    e.tick(t0 + ms(6500));
    assert_eq!(e.units().len(), 6);
    assert_eq!(count(&log, "paused"), 1);
    assert_eq!(count(&log, "resumed"), 1);
}

#[test]
fn intersection_raises_when_no_scroll_container() {
    let store = MemoryStore::new().with_entry(SETTINGS_KEY, serde_json::json!({"keepN": 2}));
    let (mut e, log) = recording(doc_with(12).without_scroll_container(), store);
    e.start(Instant::now());

    let watched = e.doc().observed().unwrap();
    assert_eq!(watched, e.units()[4].prompt);

    e.on_intersection(e.units()[5].prompt, 1.0);
    e.on_intersection(watched, 0.4);
    assert_eq!(e.effective_budget(), 2);

    e.on_intersection(watched, 0.75);
    assert_eq!(e.effective_budget(), 6);
    assert_eq!(count(&log, "expand:intersection"), 1);
    assert_eq!(e.doc().observed(), Some(e.units()[0].prompt));
}

// ── Search ──

fn token_doc() -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    for (role, text) in [
        ("user", "Token budgets explained"),
        ("assistant", "nothing to see"),
        ("user", "a token and another TOKEN"),
        ("assistant", "still nothing"),
        ("user", "the last tOkEn"),
        ("assistant", "done"),
    ] {
        doc.append_turn(role, text);
    }
    doc
}

#[test]
fn search_counts_every_occurrence_and_wraps() {
    let store = MemoryStore::new().with_entry(SETTINGS_KEY, serde_json::json!({"keepN": 1}));
    let (mut e, log) = recording(token_doc(), store);
    let t0 = Instant::now();
    e.start(t0);
    assert_eq!(e.stats().archived, 2);

    let out = e
        .search("token", SearchAction::Search, SearchOptions::default(), t0)
        .unwrap();
    assert_eq!((out.total, out.matches, out.current_index), (4, 3, 1));
    assert_eq!(e.doc().marks().len(), 4);
    assert_eq!(e.doc().highlighted_text()[2], "TOKEN");
    // Every matching exchange is revealed.
    assert!(e.hidden_elements().is_empty());
    assert_eq!(count(&log, "expand:search"), 1);

    let mut index = out.current_index;
    for _ in 0..out.total {
        let Response::Search(reply) = e.handle(Command::SearchNext, t0) else {
            panic!("expected a search reply");
        };
        index = reply.current_index;
    }
    assert_eq!(index, 1);

    // Same query again steps rather than re-running.
    let again = e
        .search("token", SearchAction::Search, SearchOptions::default(), t0)
        .unwrap();
    assert_eq!(again.current_index, 2);
    assert_eq!(e.doc().marks().len(), 4);
}

#[test]
fn query_split_by_inline_markup_is_found_and_revealed() {
    let mut doc = MemoryDocument::new();
    let split = doc.append_turn_parts("user", &["Tok", "en budgets explained here"]);
    doc.append_turn("assistant", "an answer about budgets");
    doc.append_turn("user", "a later question here");
    doc.append_turn("assistant", "a later answer here");
    let store = MemoryStore::new().with_entry(SETTINGS_KEY, serde_json::json!({"keepN": 1}));
    let (mut e, _) = recording(doc, store);
    let t0 = Instant::now();
    e.start(t0);
    assert!(!e.doc().is_visible(split));

    let out = e
        .search("token", SearchAction::Search, SearchOptions::default(), t0)
        .unwrap();
    assert_eq!((out.total, out.matches, out.current_index), (1, 1, 1));
    assert!(e.doc().is_visible(split));
    assert_eq!(e.doc().highlighted_text(), vec!["Tok", "en"]);
    assert!(e.doc().marks().iter().all(|m| m.active));
}

#[test]
fn current_match_is_scrolled_to_and_flash_expires() {
    let store = MemoryStore::new().with_entry(SETTINGS_KEY, serde_json::json!({"keepN": 1}));
    let (mut e, _) = recording(token_doc(), store);
    let t0 = Instant::now();
    e.start(t0);
    e.search("token", SearchAction::Search, SearchOptions::default(), t0)
        .unwrap();

    let active = |e: &Engine<MemoryDocument>| e.doc().marks().iter().filter(|m| m.active).count();
    assert_eq!(active(&e), 1);
    assert!(e.doc().marks()[0].active);
    let requests = e.doc().scroll_requests().len();

    e.tick(t0 + ms(100));
    assert_eq!(e.doc().scroll_requests().len(), requests + 1);
    e.tick(t0 + ms(1500));
    assert_eq!(active(&e), 0);
}

#[test]
fn role_filter_limits_matches() {
    let (mut e, _) = recording(token_doc(), MemoryStore::new());
    let now = Instant::now();
    e.start(now);
    let reply = e.handle(
        Command::SearchArchive {
            query: "nothing".into(),
            action: SearchAction::Search,
            use_regex: false,
            filter: RoleFilter::User,
        },
        now,
    );
    let Response::Search(reply) = reply else {
        panic!("expected a search reply");
    };
    assert_eq!(reply.total, 0);
    assert_eq!(reply.current_index, 0);
}

#[test]
fn invalid_regex_leaves_page_untouched() {
    let (mut e, _) = engine(12, 2);
    let now = Instant::now();
    e.start(now);

    let hidden = e.hidden_elements();
    let reply = e.handle(
        Command::SearchArchive {
            query: "(".into(),
            action: SearchAction::Search,
            use_regex: true,
            filter: RoleFilter::All,
        },
        now,
    );
    assert!(reply.error_message().is_some());
    assert_eq!(e.hidden_elements(), hidden);
    assert!(e.doc().marks().is_empty());

    // Also with a live search on screen.
    e.search(r"message \d+", SearchAction::Search, regex(), now)
        .unwrap();
    let hidden = e.hidden_elements();
    let marks = e.doc().marks().to_vec();
    let outcome = e.search_state().outcome();
    let err = e
        .search("([a-z]", SearchAction::Search, regex(), now)
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidPattern(_)));
    assert_eq!(e.hidden_elements(), hidden);
    assert_eq!(e.doc().marks(), marks.as_slice());
    assert_eq!(e.search_state().outcome(), outcome);
}

fn regex() -> SearchOptions {
    SearchOptions {
        use_regex: true,
        filter: RoleFilter::All,
    }
}

#[test]
fn short_query_is_rejected() {
    let (mut e, _) = engine(4, 5);
    let now = Instant::now();
    e.start(now);
    let err = e
        .search("a", SearchAction::Search, SearchOptions::default(), now)
        .unwrap_err();
    assert_eq!(err, SearchError::QueryTooShort);
}

#[test]
fn clearing_search_keeps_the_raise() {
    let (mut e, log) = engine(12, 2);
    let now = Instant::now();
    e.start(now);
    e.search("message 0", SearchAction::Search, SearchOptions::default(), now)
        .unwrap();
    assert_eq!(e.effective_budget(), 6);
    assert_eq!(e.handle(Command::ClearSearch, now), Response::ok());
    assert!(e.doc().marks().is_empty());
    assert!(!e.search_state().is_active());
    assert_eq!(e.effective_budget(), 6);
    assert_eq!(count(&log, "cleared"), 1);
}

// ── Store failures and commands ──

#[test]
fn unavailable_store_degrades_to_memory() {
    let mut store = MemoryStore::new();
    store.set_unavailable(true);
    let (mut e, log) = recording(doc_with(12), store);
    e.start(Instant::now());

    assert!(e.is_degraded());
    assert_eq!(e.persisted_budget(), 5);
    e.set_budget(3, true);
    assert_eq!(e.stats().visible, 3);
    assert_eq!(count(&log, "persist-failed"), 1);
}

#[test]
fn export_includes_hidden_messages() {
    let (mut e, _) = engine(6, 1);
    let now = Instant::now();
    e.start(now);
    let Response::Messages { messages } = e.handle(Command::GetAllMessagesForExport, now) else {
        panic!("expected messages");
    };
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[0], "message 0 about the topic");
}

#[test]
fn apply_settings_reloads_budget_from_store() {
    let (mut e, _) = engine(20, 4);
    let now = Instant::now();
    e.start(now);
    e.search("message 0", SearchAction::Search, SearchOptions::default(), now)
        .unwrap();
    assert!(e.is_auto_expanded());

    assert_eq!(e.handle(Command::ApplySettings, now), Response::ok());
    assert!(!e.is_auto_expanded());
    assert_eq!(e.stats().visible, 4);
}

#[test]
fn unknown_and_misc_commands_are_acknowledged() {
    let (mut e, _) = recording(doc_with(4).with_reload_answer(true), MemoryStore::new());
    let now = Instant::now();
    e.start(now);
    let other: Command = serde_json::from_value(serde_json::json!({"type": "somethingNew"})).unwrap();
    assert_eq!(e.handle(other, now), Response::ok());
    assert_eq!(e.handle(Command::Ping, now), Response::ok());
    assert_eq!(e.handle(Command::RefreshPrompt, now), Response::ok());
    assert_eq!(e.doc().reload_prompts(), 1);
    assert_eq!(e.handle(Command::SetBudget { keep_n: 1 }, now), Response::ok());
    assert_eq!(e.stats().visible, 1);
}
