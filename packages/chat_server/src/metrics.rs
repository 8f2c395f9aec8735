//! Server metrics for observability
//!
//! Provides runtime counters for connections, message flow and delivery health.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,
    /// Upgrade requests refused for a missing or blank user id
    pub rejected_handshakes: AtomicU64,

    // Message metrics
    /// Messages stored via the send endpoint
    pub messages_persisted: AtomicU64,

    // Delivery metrics
    /// Frames queued onto a connection
    pub events_sent: AtomicU64,
    /// Frames addressed to a connection that had already gone away
    pub deliveries_dropped: AtomicU64,
    /// Frames that could not be queued onto a live connection
    pub delivery_failures: AtomicU64,
    /// Millis since start of the latest failure, plus one; zero means never
    last_failure_ms: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_rejected(&self) {
        self.rejected_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_persisted(&self) {
        self.messages_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame raced a disconnect. Expected, not a fault.
    pub fn delivery_dropped(&self) {
        self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failed(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(self.elapsed_ms().saturating_add(1), Ordering::Relaxed);
    }

    /// Whether a delivery failure was recorded in the last `window`.
    pub fn failed_within(&self, window: Duration) -> bool {
        match self.last_failure_ms.load(Ordering::Relaxed) {
            0 => false,
            stamp => {
                let age = self.elapsed_ms().saturating_sub(stamp - 1);
                u128::from(age) <= window.as_millis()
            }
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                rejected: self.rejected_handshakes.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                persisted: self.messages_persisted.load(Ordering::Relaxed),
            },
            delivery: DeliveryMetrics {
                sent: self.events_sent.load(Ordering::Relaxed),
                dropped: self.deliveries_dropped.load(Ordering::Relaxed),
                failed: self.delivery_failures.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub delivery: DeliveryMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub persisted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    pub sent: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub online_users: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}
