//! WebSocket upgrade handler and message dispatch.
//!
//! Each connected client receives:
//! 1. Current [`RelayMessage::Stats`] on connect, if an engine is attached.
//! 2. A [`RelayMessage::Response`] for every command it sends.
//! 3. Broadcast updates as engine events fire.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use turnprune::protocol::Command;

use crate::broadcast::RelayMessage;
use crate::{EngineSlot, lock_slot};

/// Shared state for WebSocket handlers.
#[derive(Clone)]
pub struct WsState {
    pub slot: EngineSlot,
    pub broadcast_tx: broadcast::Sender<RelayMessage>,
}

/// GET /ws — WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ws_state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ws_state))
}

/// Stats message for the attached engine, if any.
fn current_stats(slot: &EngineSlot) -> Option<RelayMessage> {
    let guard = lock_slot(slot);
    let engine = guard.as_ref().filter(|e| e.is_ready())?;
    Some(RelayMessage::Stats {
        stats: engine.stats(),
        effective: engine.effective_budget(),
    })
}

async fn handle_socket(socket: WebSocket, ws_state: WsState) {
    let (mut sink, mut stream) = socket.split();

    if let Some(msg) = current_stats(&ws_state.slot)
        && ws_send(&mut sink, &msg).await.is_err()
    {
        return;
    }

    debug!("WebSocket client connected");

    // Replies and broadcasts share the sink; the forward task owns it.
    let (reply_tx, mut reply_rx) = mpsc::channel::<RelayMessage>(32);
    let mut broadcast_rx = ws_state.broadcast_tx.subscribe();
    let slot_for_resync = ws_state.slot.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
                broadcast = broadcast_rx.recv() => match broadcast {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {n} messages, resending stats");
                        match current_stats(&slot_for_resync) {
                            Some(msg) => msg,
                            None => continue,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if ws_send(&mut sink, &msg).await.is_err() {
                break; // Client disconnected.
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(command) = serde_json::from_str::<Command>(&text) else {
                    debug!("Ignoring malformed WebSocket message");
                    continue;
                };
                let response = crate::dispatch(&ws_state.slot, command);
                if reply_tx
                    .send(RelayMessage::Response { response })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping, pong.
        }
    }

    debug!("WebSocket client disconnected");
    forward_task.abort();
}

/// Serialize a `RelayMessage` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &RelayMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
