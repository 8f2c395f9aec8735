//! Connection Registry
//!
//! Live mapping from user id to that user's connection handles. A user may
//! hold several connections at once (tabs, devices); a second login never
//! replaces the first.
//!
//! Invariant: a user has an entry iff it has at least one connection. Entries
//! are removed the moment their last connection goes away, so the key set is
//! exactly the set of online users.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::PresenceError;

/// Outcome of [`ConnectionRegistry::register_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First connection for the user (Offline -> Online).
    CameOnline,
    /// The user was already online; `connections` is the new count.
    AdditionalConnection { connections: usize },
    /// The handle was already registered (for this or another user); nothing changed.
    Duplicate,
}

/// Outcome of [`ConnectionRegistry::unregister_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unregistration {
    /// The handle was the user's last connection (Online -> Offline).
    WentOffline { user_id: String },
    /// The user still has `remaining` connections.
    StillOnline { user_id: String, remaining: usize },
    /// The handle was not registered; nothing changed.
    Unknown,
}

/// Consistent view of the registry taken under a single lock acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceSnapshot<H> {
    pub online_user_ids: Vec<String>,
    pub connections: Vec<H>,
}

/// User id -> live connection handles.
///
/// Created at service start and passed explicitly to whoever needs it.
/// All operations hold the lock for their whole duration, so readers never
/// observe a half-applied mutation.
pub struct ConnectionRegistry<H> {
    users: RwLock<HashMap<String, Vec<H>>>,
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl<H: Clone + PartialEq + fmt::Debug> ConnectionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` to `user_id`'s connection set.
    ///
    /// A handle that is already tracked anywhere is ignored. Emits nothing:
    /// presence broadcasts are the caller's decision.
    pub async fn register_connection(
        &self,
        user_id: &str,
        handle: H,
    ) -> Result<Registration, PresenceError> {
        if user_id.trim().is_empty() {
            return Err(PresenceError::InvalidIdentifier);
        }

        let mut users = self.users.write().await;
        if let Some((owner, _)) = users.iter().find(|(_, conns)| conns.contains(&handle)) {
            debug!(user_id, owner = %owner, ?handle, "Ignoring duplicate connection");
            return Ok(Registration::Duplicate);
        }

        let connections = users.entry(user_id.to_string()).or_default();
        connections.push(handle);
        if connections.len() == 1 {
            Ok(Registration::CameOnline)
        } else {
            Ok(Registration::AdditionalConnection {
                connections: connections.len(),
            })
        }
    }

    /// Remove `handle` from whichever user holds it.
    ///
    /// Sweeps every user's set, so a stale owner mapping can't leave the handle
    /// behind. Unknown handles are a no-op: disconnect notifications can
    /// arrive after cleanup already happened.
    pub async fn unregister_connection(&self, handle: &H) -> Unregistration {
        let mut users = self.users.write().await;
        let mut outcome = Unregistration::Unknown;
        users.retain(|user_id, connections| {
            let before = connections.len();
            connections.retain(|h| h != handle);
            if connections.len() != before {
                outcome = if connections.is_empty() {
                    Unregistration::WentOffline {
                        user_id: user_id.clone(),
                    }
                } else {
                    Unregistration::StillOnline {
                        user_id: user_id.clone(),
                        remaining: connections.len(),
                    }
                };
            }
            !connections.is_empty()
        });
        if outcome == Unregistration::Unknown {
            debug!(?handle, "Unregister for unknown connection");
        }
        outcome
    }

    /// Live connections for `user_id`, empty if the user is offline.
    pub async fn get_connections(&self, user_id: &str) -> Vec<H> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every user with at least one connection, in arbitrary order.
    pub async fn list_online_user_ids(&self) -> Vec<String> {
        self.users.read().await.keys().cloned().collect()
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    /// Every live connection across all users.
    pub async fn all_connections(&self) -> Vec<H> {
        self.users.read().await.values().flatten().cloned().collect()
    }

    /// Online users and all their connections, read under one lock.
    pub async fn snapshot(&self) -> PresenceSnapshot<H> {
        let users = self.users.read().await;
        Self::snapshot_of(&users)
    }

    /// Run `f` on a snapshot while the read lock is still held.
    ///
    /// Register and unregister wait until `f` returns, so anything `f` sends
    /// is ordered before the next mutation and the snapshot that reports it.
    /// `f` must not block.
    pub async fn with_snapshot<R>(&self, f: impl FnOnce(&PresenceSnapshot<H>) -> R) -> R {
        let users = self.users.read().await;
        f(&Self::snapshot_of(&users))
    }

    fn snapshot_of(users: &HashMap<String, Vec<H>>) -> PresenceSnapshot<H> {
        PresenceSnapshot {
            online_user_ids: users.keys().cloned().collect(),
            connections: users.values().flatten().cloned().collect(),
        }
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.users.read().await.values().map(Vec::len).sum()
    }

    /// Empty the registry at service teardown, returning what was live so the
    /// transport can close it.
    pub async fn drain(&self) -> Vec<(String, Vec<H>)> {
        self.users.write().await.drain().collect()
    }
}
