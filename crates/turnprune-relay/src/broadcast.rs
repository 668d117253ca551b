//! [`EventHandler`] that turns engine events into relay messages.
//!
//! [`RelayBroadcastHandler`] picks the events a settings UI cares about and
//! fans them out to every connected WebSocket client through a
//! `tokio::sync::broadcast` channel.

use serde::Serialize;
use tokio::sync::broadcast;
use turnprune::events::{EngineEvent, EventHandler};
use turnprune::protocol::{Response, Stats};
use turnprune::search::SearchOutcome;

/// A message sent from the relay to WebSocket clients.
///
/// Discriminated on the `type` field when serialized to JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Reply to a command sent on the same socket.
    Response { response: Response },
    /// Exchange counts after a pruning pass.
    Stats { stats: Stats, effective: usize },
    /// A search ran or its cursor moved.
    Search {
        query: String,
        outcome: SearchOutcome,
    },
    /// Highlights were removed.
    SearchCleared,
    /// The engine could not save settings and is running in memory.
    Degraded { error: String },
}

/// Broadcasts engine events to WebSocket clients.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(RelayBroadcastHandler::new(tx.clone()));
/// ```
pub struct RelayBroadcastHandler {
    sender: broadcast::Sender<RelayMessage>,
}

impl RelayBroadcastHandler {
    pub fn new(sender: broadcast::Sender<RelayMessage>) -> Self {
        Self { sender }
    }

    fn send(&self, msg: RelayMessage) {
        // No subscribers is fine.
        let _ = self.sender.send(msg);
    }
}

impl EventHandler for RelayBroadcastHandler {
    fn on_event(&self, event: &EngineEvent<'_>) {
        match event {
            EngineEvent::Pruned { stats, effective } => self.send(RelayMessage::Stats {
                stats: *stats,
                effective: *effective,
            }),
            EngineEvent::SearchUpdated { query, outcome } => self.send(RelayMessage::Search {
                query: query.to_string(),
                outcome: *outcome,
            }),
            EngineEvent::SearchCleared => self.send(RelayMessage::SearchCleared),
            EngineEvent::PersistFailed { error, .. } => self.send(RelayMessage::Degraded {
                error: error.to_string(),
            }),
            _ => {}
        }
    }
}
