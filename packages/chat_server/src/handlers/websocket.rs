use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::ws;

/// Chat WebSocket - `GET /ws?userId=<id>`
///
/// The user id is validated before the upgrade, so a bad handshake gets a
/// plain 400 instead of an open socket that is immediately dropped.
pub async fn chat_websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<ws::ConnectQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id = match query
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
    {
        Some(u) => u,
        None => {
            state.metrics.handshake_rejected();
            debug!("Rejecting WebSocket handshake without userId");
            return ApiError::InvalidUserId.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = state.hub.clone();
    let sockets = state.sockets.clone();
    let metrics = state.metrics.clone();
    let queue_capacity = state.config.outbound_queue;

    ws.on_upgrade(move |socket| {
        ws::handle_chat_ws(socket, user_id, hub, sockets, metrics, queue_capacity)
    })
}
