//! Socket Table
//!
//! Owns the outbound queue of every open WebSocket and implements the
//! presence layer's [`Transport`]. The presence registry only ever sees
//! [`ConnectionId`]s; the queues (and therefore the sockets) stay here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use chat_presence::{DeliveryError, Transport};

use crate::metrics::ServerMetrics;

use super::protocol::OutboundFrame;

/// Unique identifier for a WebSocket connection
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

pub struct SocketTable {
    sockets: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
    metrics: Arc<ServerMetrics>,
}

impl SocketTable {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Allocate a connection id and its bounded outbound queue.
    /// The caller drains the receiver into the socket.
    pub fn open(&self, capacity: usize) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity);
        self.write_guard().insert(id, tx);
        (id, rx)
    }

    /// Drop the queue for `id`. Once the last sender is gone the writer task
    /// sees the channel close and the socket shuts down.
    pub fn close(&self, id: &ConnectionId) -> bool {
        self.write_guard().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    // Lock poisoning only happens if a holder panicked; the map itself is
    // still consistent, so keep using it.
    fn read_guard(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ConnectionId, mpsc::Sender<String>>> {
        self.sockets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<ConnectionId, mpsc::Sender<String>>> {
        self.sockets.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for SocketTable {
    type Handle = ConnectionId;

    fn send(
        &self,
        handle: &ConnectionId,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let result = self.try_enqueue(handle, event_name, payload);
        match &result {
            Ok(()) => self.metrics.event_sent(),
            Err(DeliveryError::ConnectionClosed) => self.metrics.delivery_dropped(),
            Err(_) => self.metrics.delivery_failed(),
        }
        result
    }
}

impl SocketTable {
    fn try_enqueue(
        &self,
        handle: &ConnectionId,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let json = serde_json::to_string(&OutboundFrame {
            event: event_name,
            data: payload,
        })?;

        let sockets = self.read_guard();
        let tx = sockets.get(handle).ok_or(DeliveryError::ConnectionClosed)?;
        tx.try_send(json).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::ConnectionClosed,
        })?;
        debug!(conn_id = %handle, event = event_name, "Frame queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn table() -> SocketTable {
        SocketTable::new(Arc::new(ServerMetrics::new()))
    }

    #[tokio::test]
    async fn test_send_queues_json_frame() {
        let table = table();
        let (id, mut rx) = table.open(4);

        table
            .send(&id, "getOnlineUsers", &serde_json::json!(["u1"]))
            .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["event"], "getOnlineUsers");
        assert_eq!(frame["data"], serde_json::json!(["u1"]));
        assert_eq!(table.metrics.events_sent.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_send_to_closed_connection() {
        let table = table();
        let (id, _rx) = table.open(4);
        assert!(table.close(&id));
        assert!(!table.close(&id));

        assert_eq!(
            table.send(&id, "newMessage", &serde_json::json!({})),
            Err(DeliveryError::ConnectionClosed)
        );
        assert_eq!(table.metrics.deliveries_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(table.metrics.delivery_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let table = table();
        let (id, rx) = table.open(4);
        drop(rx);
        assert_eq!(
            table.send(&id, "newMessage", &serde_json::json!({})),
            Err(DeliveryError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn test_full_queue_reports_queue_full() {
        let table = table();
        let (id, _rx) = table.open(1);
        let payload = serde_json::json!([]);

        table.send(&id, "getOnlineUsers", &payload).unwrap();
        assert_eq!(
            table.send(&id, "getOnlineUsers", &payload),
            Err(DeliveryError::QueueFull)
        );
        assert_eq!(table.metrics.delivery_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_open_and_close_tracks_len() {
        let table = table();
        let (a, _rx_a) = table.open(4);
        let (b, _rx_b) = table.open(4);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        table.close(&a);
        assert_eq!(table.len(), 1);
    }
}
