//! Events pushed to live connections.
//!
//! Event names and payload shapes match what existing chat clients listen
//! for: `getOnlineUsers` carries an array of user ids, `newMessage` carries a
//! message object with camelCase fields and a `_id` key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Image URL (uploads are handled elsewhere)
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewMessage,
    PresenceSnapshot,
}

/// A transient event, built and consumed within a single delivery call.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A message addressed to the receiving user.
    NewMessage(ChatMessage),
    /// Every user currently online.
    PresenceSnapshot(Vec<String>),
}

impl Event {
    pub const NEW_MESSAGE: &'static str = "newMessage";
    pub const ONLINE_USERS: &'static str = "getOnlineUsers";

    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewMessage(_) => EventKind::NewMessage,
            Event::PresenceSnapshot(_) => EventKind::PresenceSnapshot,
        }
    }

    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Event::NewMessage(_) => Self::NEW_MESSAGE,
            Event::PresenceSnapshot(_) => Self::ONLINE_USERS,
        }
    }

    /// JSON payload sent alongside the event name.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Event::NewMessage(message) => serde_json::to_value(message),
            Event::PresenceSnapshot(user_ids) => serde_json::to_value(user_ids),
        }
    }
}
