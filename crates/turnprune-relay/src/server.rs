//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use turnprune::logging::LogBuffer;

use crate::EngineSlot;
use crate::api::{self, AppState};
use crate::broadcast::RelayMessage;
use crate::ws::{self, WsState};

/// Build the full axum router.
///
/// The router serves:
/// - WebSocket at `/ws`
/// - REST API at `/api/*`
pub fn build_router(
    slot: EngineSlot,
    broadcast_tx: broadcast::Sender<RelayMessage>,
    logs: LogBuffer,
) -> Router {
    let app_state = AppState {
        slot: slot.clone(),
        logs,
    };
    let ws_state = WsState { slot, broadcast_tx };

    // The settings UI is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .with_state(ws_state);

    let api_routes = Router::new()
        .route("/api/command", post(api::post_command))
        .route("/api/stats", get(api::get_stats))
        .route("/api/refresh", post(api::post_refresh))
        .route("/api/logs", get(api::get_logs))
        .with_state(app_state);

    Router::new().merge(ws_routes).merge(api_routes).layer(cors)
}

/// Bind `bind_addr`, serve `router` on a Tokio task, and return the bound
/// address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("relay server stopped: {e}");
        }
    });

    Ok(addr)
}
