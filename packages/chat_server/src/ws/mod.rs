//! Chat WebSocket transport
//!
//! One WebSocket per browser tab. Each socket:
//! - Registers with the presence hub on open, unregisters on close
//! - Receives `getOnlineUsers` snapshots whenever anyone connects or leaves
//! - Receives `newMessage` events addressed to its user

mod handler;
mod protocol;
mod socket_table;

use std::sync::Arc;

use chat_presence::PresenceHub;

pub use handler::handle_chat_ws;
pub use protocol::ConnectQuery;
pub use socket_table::SocketTable;

/// Presence hub wired to the WebSocket transport
pub type ChatHub = PresenceHub<Arc<SocketTable>>;
