//! Events emitted by the [`Engine`](crate::engine::Engine) and the handlers
//! that observe them.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or headless runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | Custom `impl EventHandler` | Full control (relay broadcast, metrics) |

use tracing::{debug, info, warn};

use crate::prune::ExpandTrigger;
use crate::protocol::Stats;
use crate::search::SearchOutcome;

// ── Events ─────────────────────────────────────────────────────────

/// Lifecycle and state-change events.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    /// Messages were found and the first pruning pass ran.
    Ready { units: usize, matcher: &'a str },
    /// The startup check gave up without finding messages.
    StartupAbandoned { attempts: u32 },
    /// A pruning pass finished.
    Pruned { stats: Stats, effective: usize },
    /// The budget was set (manually or by a settings reload).
    BudgetChanged {
        persisted: usize,
        effective: usize,
        manual: bool,
    },
    /// The effective budget was raised temporarily.
    AutoExpanded {
        trigger: ExpandTrigger,
        from: usize,
        to: usize,
    },
    /// A temporary raise was dropped.
    Reverted { to: usize },
    /// A reply started streaming; mutation reactions are suspended.
    GenerationPaused,
    /// The reply finished; mutation reactions resume.
    GenerationResumed,
    /// A search ran or its cursor moved.
    SearchUpdated {
        query: &'a str,
        outcome: SearchOutcome,
    },
    /// Highlights were removed.
    SearchCleared,
    /// Saving to the settings store failed; the engine keeps going in memory.
    PersistFailed { key: &'a str, error: &'a str },
}

/// Observer of [`EngineEvent`]s. The default implementation ignores them.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &EngineEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let EngineEvent::Pruned { stats, .. } = event {
///         println!("{} / {}", stats.visible, stats.total);
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&EngineEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&EngineEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&EngineEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &EngineEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(relay_forwarder);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &EngineEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &EngineEvent<'_>) {
        match event {
            EngineEvent::Ready { units, matcher } => {
                info!(matcher, "ready with {units} exchanges");
            }
            EngineEvent::StartupAbandoned { attempts } => {
                info!("no messages after {attempts} attempts, giving up");
            }
            EngineEvent::Pruned { stats, effective } => {
                debug!(
                    effective,
                    "pruned: {} visible, {} archived, {} total",
                    stats.visible,
                    stats.archived,
                    stats.total
                );
            }
            EngineEvent::BudgetChanged {
                persisted,
                effective,
                manual,
            } => {
                info!(persisted, effective, manual, "budget changed");
            }
            EngineEvent::AutoExpanded { trigger, from, to } => {
                info!(%trigger, "auto-expanded {from} -> {to}");
            }
            EngineEvent::Reverted { to } => {
                info!("new exchange, budget reverted to {to}");
            }
            EngineEvent::GenerationPaused => debug!("generation started, watcher paused"),
            EngineEvent::GenerationResumed => debug!("generation finished, watcher resumed"),
            EngineEvent::SearchUpdated { query, outcome } => {
                debug!(
                    query,
                    "search: match {} of {} in {} exchanges",
                    outcome.current_index,
                    outcome.total,
                    outcome.matches
                );
            }
            EngineEvent::SearchCleared => debug!("search cleared"),
            EngineEvent::PersistFailed { key, error } => {
                warn!(key, "settings not saved: {error}");
            }
        }
    }
}
