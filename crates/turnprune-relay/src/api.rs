//! REST endpoint handlers.
//!
//! Request/response counterparts of the WebSocket channel, for clients that
//! only need one answer (the popup's stats poll, one-shot commands).

use axum::Json;
use axum::extract::State;
use turnprune::logging::{LogBuffer, LogLine};
use turnprune::protocol::{Command, Response};

use crate::{EngineSlot, dispatch};

/// Shared state passed to all REST handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub slot: EngineSlot,
    pub logs: LogBuffer,
}

/// POST /api/command — Run one protocol command.
///
/// Always answers 200 with a [`Response`]; failures (including "no engine
/// attached") travel in its `error` field.
pub async fn post_command(
    State(app): State<AppState>,
    Json(command): Json<Command>,
) -> Json<Response> {
    Json(dispatch(&app.slot, command))
}

/// GET /api/stats — Shorthand for `{"type": "getStats"}`.
pub async fn get_stats(State(app): State<AppState>) -> Json<Response> {
    Json(dispatch(&app.slot, Command::GetStats))
}

/// POST /api/refresh — Offer the reader a page reload.
pub async fn post_refresh(State(app): State<AppState>) -> Json<Response> {
    Json(dispatch(&app.slot, Command::RefreshPrompt))
}

/// GET /api/logs — Captured diagnostics, oldest first.
pub async fn get_logs(State(app): State<AppState>) -> Json<Vec<LogLine>> {
    Json(app.logs.snapshot())
}
