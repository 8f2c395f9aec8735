//! Event Broadcaster
//!
//! Resolves delivery targets from the registry and hands each event to the
//! transport, one send per connection. Delivery is best-effort: offline
//! users get nothing, and a failing connection never stops the rest of the
//! batch.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::event::Event;
use crate::registry::ConnectionRegistry;
use crate::transport::Transport;

/// Per-call delivery counts, for logs and metrics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct EventBroadcaster<T: Transport> {
    registry: Arc<ConnectionRegistry<T::Handle>>,
    transport: T,
}

impl<T: Transport> EventBroadcaster<T> {
    pub fn new(registry: Arc<ConnectionRegistry<T::Handle>>, transport: T) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Push `event` to every live connection of `user_id`.
    ///
    /// No queuing for offline users: if the user has no connections the
    /// event is dropped.
    pub async fn deliver_to_user(&self, user_id: &str, event: &Event) -> DeliveryReport {
        let targets = self.registry.get_connections(user_id).await;
        if targets.is_empty() {
            debug!(user_id, event = event.name(), "Recipient offline, dropping event");
            return DeliveryReport::default();
        }
        self.fan_out(&targets, event)
    }

    /// Send the full list of online users to every live connection.
    ///
    /// Must be called after the registry mutation it reports on has
    /// completed, so the snapshot reflects the post-mutation state. The
    /// fan-out runs under the registry read lock: a later mutation cannot
    /// finish until this snapshot is queued everywhere, so no client ends
    /// up holding an older list than the one the registry reports.
    pub async fn broadcast_presence(&self) -> DeliveryReport {
        self.registry
            .with_snapshot(|snapshot| {
                let event = Event::PresenceSnapshot(snapshot.online_user_ids.clone());
                self.fan_out(&snapshot.connections, &event)
            })
            .await
    }

    fn fan_out(&self, targets: &[T::Handle], event: &Event) -> DeliveryReport {
        let mut report = DeliveryReport {
            attempted: targets.len(),
            ..Default::default()
        };

        let payload = match event.payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(event = event.name(), "Failed to encode event: {}", e);
                report.failed = targets.len();
                return report;
            }
        };

        for handle in targets {
            match self.transport.send(handle, event.name(), &payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        ?handle,
                        event = event.name(),
                        code = e.error_code(),
                        "Delivery failed: {}",
                        e
                    );
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChatMessage;
    use crate::transport::testing::RecordingTransport;
    use chrono::Utc;

    fn broadcaster() -> (
        Arc<ConnectionRegistry<&'static str>>,
        EventBroadcaster<Arc<RecordingTransport>>,
        Arc<RecordingTransport>,
    ) {
        let registry = Arc::new(ConnectionRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let broadcaster = EventBroadcaster::new(registry.clone(), transport.clone());
        (registry, broadcaster, transport)
    }

    fn message(receiver: &str) -> ChatMessage {
        ChatMessage {
            id: "m-1".into(),
            sender_id: "u1".into(),
            receiver_id: receiver.into(),
            text: Some("hello".into()),
            image: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_deliver_to_each_connection_once() {
        let (registry, broadcaster, transport) = broadcaster();
        registry.register_connection("u2", "h3").await.unwrap();
        registry.register_connection("u2", "h4").await.unwrap();
        registry.register_connection("u1", "h1").await.unwrap();

        let m = message("u2");
        let report = broadcaster
            .deliver_to_user("u2", &Event::NewMessage(m.clone()))
            .await;

        assert_eq!(
            report,
            DeliveryReport {
                attempted: 2,
                delivered: 2,
                failed: 0
            }
        );
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(transport.handles(), vec!["h3", "h4"]);
        let expected = serde_json::to_value(&m).unwrap();
        for (_, name, payload) in sent {
            assert_eq!(name, "newMessage");
            assert_eq!(payload, expected);
        }
    }

    #[tokio::test]
    async fn test_deliver_to_offline_user_sends_nothing() {
        let (registry, broadcaster, transport) = broadcaster();
        registry.register_connection("u1", "h1").await.unwrap();

        let report = broadcaster
            .deliver_to_user("u2", &Event::NewMessage(message("u2")))
            .await;

        assert_eq!(report, DeliveryReport::default());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_presence_reaches_everyone() {
        let (registry, broadcaster, transport) = broadcaster();
        registry.register_connection("u1", "h1").await.unwrap();
        registry.register_connection("u1", "h2").await.unwrap();
        registry.register_connection("u2", "h3").await.unwrap();

        let report = broadcaster.broadcast_presence().await;
        assert_eq!(report.delivered, 3);

        let sent = transport.sent();
        let mut handles = transport.handles();
        handles.sort();
        assert_eq!(handles, vec!["h1", "h2", "h3"]);

        let first = &sent[0].2;
        let mut users: Vec<String> = serde_json::from_value(first.clone()).unwrap();
        users.sort();
        assert_eq!(users, vec!["u1", "u2"]);
        for (_, name, payload) in &sent {
            assert_eq!(name, "getOnlineUsers");
            assert_eq!(payload, first);
        }
    }

    #[tokio::test]
    async fn test_failed_handle_does_not_abort_batch() {
        let (registry, broadcaster, transport) = broadcaster();
        registry.register_connection("u2", "h3").await.unwrap();
        registry.register_connection("u2", "h4").await.unwrap();
        registry.register_connection("u2", "h5").await.unwrap();
        transport.fail("h3");

        let report = broadcaster
            .deliver_to_user("u2", &Event::NewMessage(message("u2")))
            .await;

        assert_eq!(
            report,
            DeliveryReport {
                attempted: 3,
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(transport.handles(), vec!["h4", "h5"]);
    }

    #[tokio::test]
    async fn test_broadcast_presence_with_nobody_online() {
        let (_registry, broadcaster, transport) = broadcaster();
        let report = broadcaster.broadcast_presence().await;
        assert_eq!(report.attempted, 0);
        assert!(transport.sent().is_empty());
    }
}
