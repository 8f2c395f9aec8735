//! Error types for presence tracking and event delivery.

/// Hard errors raised by the registry.
///
/// Disconnect races (unknown handles) and duplicate registrations are not
/// errors; they are reported through [`crate::Registration`] and
/// [`crate::Unregistration`] instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    #[error("user id must not be empty")]
    InvalidIdentifier,
}

impl PresenceError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidIdentifier => "invalid_identifier",
        }
    }
}

/// Failure to hand one event to one connection.
///
/// Isolated per handle: the broadcaster logs it and moves on to the next
/// connection. Never returned to callers of the delivery operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("outbound queue full")]
    QueueFull,

    #[error("failed to encode event: {0}")]
    Encode(String),
}

impl DeliveryError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::ConnectionClosed => "connection_closed",
            Self::QueueFull => "queue_full",
            Self::Encode(_) => "encode_failed",
        }
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        DeliveryError::Encode(err.to_string())
    }
}
