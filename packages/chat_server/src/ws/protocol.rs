//! WebSocket Protocol Types
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

/// Client heartbeat; answered with [`PONG_EVENT`].
pub const PING_EVENT: &str = "ping";
pub const PONG_EVENT: &str = "pong";

/// Server -> client frame.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a> {
    pub event: &'a str,
    pub data: &'a serde_json::Value,
}

/// Client -> server frame. Any `data` is ignored; only heartbeats are understood.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
}

/// Handshake query: `/ws?userId=<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}
