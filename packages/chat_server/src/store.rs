//! In-memory message store.
//!
//! Messages live for the lifetime of the process. The send handler writes
//! here before announcing anything, so a client notified of a message can
//! always read it back.

use chat_presence::ChatMessage;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MessageStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return the stored copy.
    pub async fn insert(&self, message: ChatMessage) -> ChatMessage {
        self.messages.write().await.push(message.clone());
        message
    }

    /// Messages exchanged between `a` and `b` in either direction, oldest first.
    pub async fn conversation(&self, a: &str, b: &str) -> Vec<ChatMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }
}
