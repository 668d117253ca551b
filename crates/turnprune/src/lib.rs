//! Visibility pruning for long AI chat transcripts.
//!
//! Long chat pages get slow because every turn stays laid out. `turnprune`
//! keeps the most recent exchanges visible and suppresses the rest from
//! layout (never removing them), while still letting the reader search and
//! export the whole conversation.
//!
//! The engine runs against a [`DocumentAdapter`](dom::DocumentAdapter), a
//! capability interface over the host page. A browser binding implements it
//! over the live DOM; [`MemoryDocument`](dom::MemoryDocument) implements it
//! in memory for tests, the CLI and the relay.
//!
//! ```ignore
//! use turnprune::prelude::*;
//!
//! let fixture = ConversationFixture::from_path("chat.json".as_ref())?;
//! let mut engine = Engine::new(fixture.into_document(), MemoryStore::new())
//!     .with_handler(LoggingHandler);
//! engine.start(Instant::now());
//! let stats = engine.stats();
//! println!("{} visible / {} total", stats.visible, stats.total);
//! ```
//!
//! # Where to find things
//!
//! - **How messages are found:** [`MessageLocator`](prune::MessageLocator)
//!   tries an ordered list of selector strategies. New page markup means a
//!   new [`Matcher`](prune::Matcher), not new logic.
//!
//! - **What gets hidden:** [`Budgeter`](prune::Budgeter) holds the persisted
//!   and effective budgets and the hidden set. The
//!   [`Engine`](engine::Engine) funnels every trigger (badge click, scroll,
//!   mutation, search, command) into one
//!   [`apply_pruning`](engine::Engine::apply_pruning) pass.
//!
//! - **Time:** nothing spawns timers. The host calls
//!   [`Engine::tick`](engine::Engine::tick); debounces and retries are
//!   [`Debouncer`](prune::Debouncer) and [`Interval`](prune::Interval)
//!   state machines polled from there.
//!
//! - **Observing the engine:** implement
//!   [`EventHandler`](events::EventHandler), or use
//!   [`LoggingHandler`](events::LoggingHandler). Log lines can be captured
//!   with [`DiagnosticsLayer`](logging::DiagnosticsLayer).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dom`] | Document adapter trait, in-memory document, conversation fixtures |
//! | [`prune`] | Locator, grouper, budgeter, auto-expand, mutation watcher, timers |
//! | [`search`] | Regex/literal search with highlighting and wraparound navigation |
//! | [`indicator`] | On-page badge view and gestures |
//! | [`engine`] | The stateful engine tying it all together |
//! | [`protocol`] | Popup commands and responses |
//! | [`config`] | Settings, presets, settings stores |
//! | [`export`] | JSON, Markdown, text and HTML export |
//! | [`events`] | Engine events and handlers |
//! | [`logging`] | Tracing layer that buffers diagnostics in memory |

pub mod config;
pub mod dom;
pub mod engine;
pub mod events;
pub mod export;
pub mod indicator;
pub mod logging;
pub mod prelude;
pub mod protocol;
pub mod prune;
pub mod search;

use schemars::JsonSchema;

/// JSON Schema for `T` as a `serde_json::Value`.
///
/// ```
/// use turnprune::{config::Settings, json_schema_for};
///
/// let schema = json_schema_for::<Settings>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["properties"]["keepN"].is_object());
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
