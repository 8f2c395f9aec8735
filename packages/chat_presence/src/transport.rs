use std::fmt;
use std::sync::Arc;

use crate::error::DeliveryError;

/// Outbound send primitive supplied by the transport layer.
///
/// `send` is fire-and-forget: implementations must not block on network
/// I/O. The returned error is only used for logging and counting.
pub trait Transport: Send + Sync {
    /// Opaque connection identity. The registry compares handles but never
    /// owns or closes the underlying connection.
    type Handle: Clone + PartialEq + fmt::Debug + Send + Sync;

    fn send(
        &self,
        handle: &Self::Handle,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    type Handle = T::Handle;

    fn send(
        &self,
        handle: &Self::Handle,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        (**self).send(handle, event_name, payload)
    }
}
