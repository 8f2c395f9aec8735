pub mod health;
pub mod messages;
pub mod presence;
pub mod websocket;

pub use health::{health_handler, health_live_handler, metrics_handler};
pub use messages::{get_conversation_handler, send_message_handler};
pub use presence::online_users_handler;
pub use websocket::chat_websocket_handler;
