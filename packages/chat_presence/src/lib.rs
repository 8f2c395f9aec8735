//! Chat Presence - connection registry and event fan-out
//!
//! This crate tracks which live connections belong to which users and pushes
//! events to them. It knows nothing about sockets: the transport layer hands
//! in opaque connection handles and implements [`Transport`] to actually
//! write frames.
//!
//! # Example
//!
//! ```no_run
//! use chat_presence::{DeliveryError, Event, PresenceHub, Transport};
//!
//! struct Stdout;
//!
//! impl Transport for Stdout {
//!     type Handle = u64;
//!
//!     fn send(
//!         &self,
//!         handle: &u64,
//!         event_name: &str,
//!         payload: &serde_json::Value,
//!     ) -> Result<(), DeliveryError> {
//!         println!("conn {}: {} {}", handle, event_name, payload);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = PresenceHub::new(Stdout);
//!
//!     // Two tabs for the same user: still a single online user
//!     hub.on_connect("u1", 1).await.unwrap();
//!     hub.on_connect("u1", 2).await.unwrap();
//!     assert_eq!(hub.registry().list_online_user_ids().await, vec!["u1"]);
//!
//!     hub.on_disconnect(&1).await;
//!     hub.on_disconnect(&2).await;
//!     assert!(hub.registry().list_online_user_ids().await.is_empty());
//! }
//! ```

mod broadcaster;
mod error;
mod event;
mod hub;
mod registry;
mod transport;

pub use broadcaster::{DeliveryReport, EventBroadcaster};
pub use error::{DeliveryError, PresenceError};
pub use event::{ChatMessage, Event, EventKind};
pub use hub::PresenceHub;
pub use registry::{ConnectionRegistry, PresenceSnapshot, Registration, Unregistration};
pub use transport::Transport;
