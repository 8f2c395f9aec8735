//! Presence Hub
//!
//! Entry point for the transport layer. Pairs each registry mutation with
//! the presence broadcast that reports it, in that order.

use std::sync::Arc;
use tracing::info;

use crate::broadcaster::{DeliveryReport, EventBroadcaster};
use crate::error::PresenceError;
use crate::event::Event;
use crate::registry::{ConnectionRegistry, Registration, Unregistration};
use crate::transport::Transport;

pub struct PresenceHub<T: Transport> {
    registry: Arc<ConnectionRegistry<T::Handle>>,
    broadcaster: EventBroadcaster<T>,
}

impl<T: Transport> PresenceHub<T> {
    /// Create a hub with a fresh, empty registry.
    pub fn new(transport: T) -> Self {
        Self::with_registry(Arc::new(ConnectionRegistry::new()), transport)
    }

    pub fn with_registry(registry: Arc<ConnectionRegistry<T::Handle>>, transport: T) -> Self {
        let broadcaster = EventBroadcaster::new(registry.clone(), transport);
        Self {
            registry,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry<T::Handle>> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &EventBroadcaster<T> {
        &self.broadcaster
    }

    /// A transport session opened for `user_id`.
    ///
    /// Registers the handle, then broadcasts the updated presence snapshot.
    /// An invalid user id is rejected before anything is mutated or sent.
    pub async fn on_connect(
        &self,
        user_id: &str,
        handle: T::Handle,
    ) -> Result<Registration, PresenceError> {
        let registration = self.registry.register_connection(user_id, handle).await?;
        match registration {
            Registration::CameOnline => info!(user_id, "User online"),
            Registration::AdditionalConnection { connections } => {
                info!(user_id, connections, "User opened another connection")
            }
            Registration::Duplicate => {}
        }
        self.broadcaster.broadcast_presence().await;
        Ok(registration)
    }

    /// A transport session closed. Safe to call for handles already removed.
    pub async fn on_disconnect(&self, handle: &T::Handle) -> Unregistration {
        let unregistration = self.registry.unregister_connection(handle).await;
        if let Unregistration::WentOffline { user_id } = &unregistration {
            info!(user_id = %user_id, "User offline");
        }
        self.broadcaster.broadcast_presence().await;
        unregistration
    }

    pub async fn deliver_to_user(&self, user_id: &str, event: &Event) -> DeliveryReport {
        self.broadcaster.deliver_to_user(user_id, event).await
    }

    /// Tear down at service shutdown. Returns the connections that were
    /// still live; closing them is the transport's job.
    pub async fn shutdown(&self) -> Vec<(String, Vec<T::Handle>)> {
        let drained = self.registry.drain().await;
        info!(users = drained.len(), "Presence registry drained");
        drained
    }
}
