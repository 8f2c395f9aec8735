//! WebSocket Handler
//!
//! One task per socket: registers the connection with the presence hub,
//! pumps queued frames out, answers heartbeats, and unregisters on close.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use chat_presence::Transport;

use crate::metrics::ServerMetrics;

use super::ChatHub;
use super::protocol::{InboundFrame, PING_EVENT, PONG_EVENT};
use super::socket_table::SocketTable;

/// Handle one chat WebSocket for `user_id`
pub async fn handle_chat_ws(
    socket: WebSocket,
    user_id: String,
    hub: Arc<ChatHub>,
    sockets: Arc<SocketTable>,
    metrics: Arc<ServerMetrics>,
    queue_capacity: usize,
) {
    let (connection_id, mut rx) = sockets.open(queue_capacity);
    metrics.connection_opened();
    info!(conn_id = %connection_id, user_id = %user_id, "WebSocket connected");

    // The queue exists before registration, so the first presence snapshot
    // (which includes this connection) is buffered rather than lost.
    if let Err(e) = hub.on_connect(&user_id, connection_id).await {
        warn!(conn_id = %connection_id, "Rejecting connection: {}", e);
        sockets.close(&connection_id);
        metrics.connection_closed();
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer and reader share one loop so `rx` outlives the socket: a frame
    // queued after the peer left still lands in a live channel until the
    // connection is unregistered below.
    loop {
        tokio::select! {
            queued = rx.recv() => {
                let Some(json) = queued else { break };
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    debug!(conn_id = %connection_id, "WebSocket write failed");
                    break;
                }
            }
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<InboundFrame>(&text) {
                            Ok(frame) if frame.event == PING_EVENT => {
                                let _ = sockets.send(
                                    &connection_id,
                                    PONG_EVENT,
                                    &serde_json::Value::Null,
                                );
                            }
                            Ok(frame) => {
                                debug!(conn_id = %connection_id, event = %frame.event, "Ignoring client event");
                            }
                            Err(e) => {
                                debug!(conn_id = %connection_id, "Malformed client frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %connection_id, "WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Unregister while the queue is still open, then drop it.
    hub.on_disconnect(&connection_id).await;
    sockets.close(&connection_id);
    drop(rx);
    let _ = ws_sender.close().await;
    metrics.connection_closed();
    info!(conn_id = %connection_id, user_id = %user_id, "WebSocket disconnected");
}
