//! Message relay between a settings UI and a page-resident engine.
//!
//! `turnprune-relay` is an axum server that carries protocol
//! [`Command`](turnprune::protocol::Command)s from a popup-like client to a
//! [`turnprune`] engine and pushes engine updates back. Clients talk either
//! request/response over REST or over a WebSocket that also receives
//! broadcasts.
//!
//! # Quick start
//!
//! ```ignore
//! use turnprune::prelude::*;
//! use turnprune_relay::{RelayBroadcastHandler, RelayConfig, RelayMessage, spawn_relay, spawn_ticker};
//!
//! let (tx, _) = tokio::sync::broadcast::channel::<RelayMessage>(256);
//! let engine = Engine::new(fixture.into_document(), MemoryStore::new())
//!     .with_handler(RelayBroadcastHandler::new(tx.clone()));
//! let slot = turnprune_relay::attach(engine);
//!
//! let addr = spawn_relay(slot.clone(), tx, logs, RelayConfig::default()).await?;
//! spawn_ticker(slot);
//! println!("relay: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! Engine ──EngineEvent──▶ RelayBroadcastHandler ──RelayMessage──▶ WebSocket clients
//!   ▲                                                                  │
//!   └── Arc<Mutex<Option<Engine>>> ◀── /api/command, /ws commands ─────┘
//! ```
//!
//! An empty slot stands for a page whose engine isn't loaded yet: every
//! command answers with [`NOT_READY_ERROR`].

mod api;
pub mod broadcast;
mod server;
mod ws;

pub use broadcast::{RelayBroadcastHandler, RelayMessage};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast as channel;
use tokio::task::JoinHandle;
use turnprune::dom::MemoryDocument;
use turnprune::engine::Engine;
use turnprune::logging::LogBuffer;
use turnprune::protocol::{Command, NOT_READY_ERROR, Response};

/// The engine behind the relay, absent until a page attaches one.
pub type EngineSlot = Arc<Mutex<Option<Engine<MemoryDocument>>>>;

/// How often the background task advances engine timers.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Configuration for the relay server.
pub struct RelayConfig {
    /// Address to bind to. Default: `127.0.0.1:3002`.
    pub bind_addr: SocketAddr,
    /// Broadcast channel capacity. Default: 256.
    ///
    /// Clients that fall behind by this many messages receive fresh stats
    /// to resynchronize.
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3002)),
            broadcast_capacity: 256,
        }
    }
}

/// A slot holding `engine`.
pub fn attach(engine: Engine<MemoryDocument>) -> EngineSlot {
    Arc::new(Mutex::new(Some(engine)))
}

/// A slot with no engine yet.
pub fn empty_slot() -> EngineSlot {
    Arc::new(Mutex::new(None))
}

pub(crate) fn lock_slot(slot: &EngineSlot) -> MutexGuard<'_, Option<Engine<MemoryDocument>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hand `command` to the engine in `slot`.
pub fn dispatch(slot: &EngineSlot, command: Command) -> Response {
    match lock_slot(slot).as_mut() {
        Some(engine) => engine.handle(command, Instant::now()),
        None => Response::error(NOT_READY_ERROR),
    }
}

/// Spawn the relay server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
///
/// # Arguments
///
/// * `slot` — The engine to drive.
/// * `broadcast_tx` — Sender half of the WebSocket broadcast channel. Pass
///   the same sender to [`RelayBroadcastHandler::new()`].
/// * `logs` — Buffer served at `/api/logs`.
/// * `config` — Server configuration.
pub async fn spawn_relay(
    slot: EngineSlot,
    broadcast_tx: channel::Sender<RelayMessage>,
    logs: LogBuffer,
    config: RelayConfig,
) -> std::io::Result<SocketAddr> {
    let router = server::build_router(slot, broadcast_tx, logs);
    server::start_server(router, config.bind_addr).await
}

/// Advance the engine's timers every [`TICK_PERIOD`].
pub fn spawn_ticker(slot: EngineSlot) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Some(engine) = lock_slot(&slot).as_mut() {
                engine.tick(Instant::now());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_reports_not_ready() {
        let slot = empty_slot();
        let response = dispatch(&slot, Command::GetStats);
        assert_eq!(response.error_message(), Some(NOT_READY_ERROR));
    }
}
