//! Realtime connection registry.
//!
//! Maps a profile id to its live WebSocket connections (one per device/tab).
//! Each connection carries an unbounded sender the hub pushes
//! [`ServerEvent`]s into; a forwarding task in the WebSocket handler drains
//! it onto the socket, so per-connection ordering follows the transport.
//!
//! Presence: a user is online while at least one registered connection is
//! alive.  Heartbeats refresh `last_seen`; the sweeper evicts connections
//! that stayed silent past the configured timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use velonet_shared::events::ServerEvent;
use velonet_shared::PresenceStatus;

/// A single live connection.
struct Connection {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
    last_seen: Instant,
}

/// Everything the hub knows about one user.
struct UserPresence {
    status: PresenceStatus,
    connections: Vec<Connection>,
}

/// Registry of connected users.  Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct Hub {
    users: Arc<RwLock<HashMap<Uuid, UserPresence>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user`.  Returns the connection id and
    /// whether this took the user from offline to online.
    pub async fn register(
        &self,
        user: Uuid,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> (Uuid, bool) {
        let conn_id = Uuid::new_v4();
        let mut users = self.users.write().await;

        let entry = users.entry(user).or_insert_with(|| UserPresence {
            status: PresenceStatus::Offline,
            connections: Vec::new(),
        });

        let came_online = entry.connections.is_empty();
        if came_online {
            entry.status = PresenceStatus::Online;
        }
        entry.connections.push(Connection {
            id: conn_id,
            tx,
            last_seen: Instant::now(),
        });

        debug!(user = %user, conn = %conn_id, came_online, "realtime connection registered");
        (conn_id, came_online)
    }

    /// Refresh the heartbeat timestamp of one connection.  Returns `false`
    /// when the connection is no longer registered.
    pub async fn heartbeat(&self, user: Uuid, conn_id: Uuid) -> bool {
        let mut users = self.users.write().await;
        let Some(entry) = users.get_mut(&user) else {
            return false;
        };
        match entry.connections.iter_mut().find(|c| c.id == conn_id) {
            Some(conn) => {
                conn.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Record a client-driven status change (e.g. away).
    pub async fn set_status(&self, user: Uuid, status: PresenceStatus) {
        let mut users = self.users.write().await;
        if let Some(entry) = users.get_mut(&user) {
            entry.status = status;
        }
    }

    /// Current presence of a user; `Offline` when unknown.
    pub async fn status_of(&self, user: Uuid) -> PresenceStatus {
        let users = self.users.read().await;
        users
            .get(&user)
            .map(|e| e.status)
            .unwrap_or(PresenceStatus::Offline)
    }

    pub async fn is_online(&self, user: Uuid) -> bool {
        self.status_of(user).await != PresenceStatus::Offline
    }

    /// Drop one connection.  Returns `true` when it was the user's last and
    /// they are now offline.
    pub async fn remove(&self, user: Uuid, conn_id: Uuid) -> bool {
        let mut users = self.users.write().await;
        let Some(entry) = users.get_mut(&user) else {
            return false;
        };
        entry.connections.retain(|c| c.id != conn_id);

        if entry.connections.is_empty() {
            users.remove(&user);
            debug!(user = %user, "user went offline");
            true
        } else {
            false
        }
    }

    /// Push an event to every live connection of `user`.  Connections whose
    /// receiver is gone are dropped on the spot.  Returns `true` if at least
    /// one connection took the event.
    pub async fn send_to_user(&self, user: Uuid, event: &ServerEvent) -> bool {
        let mut users = self.users.write().await;
        let Some(entry) = users.get_mut(&user) else {
            return false;
        };

        entry.connections.retain(|c| c.tx.send(event.clone()).is_ok());
        if entry.connections.is_empty() {
            users.remove(&user);
            return false;
        }
        true
    }

    /// Push an event to each of `targets`; returns how many users received it.
    pub async fn send_to_many(&self, targets: &[Uuid], event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for target in targets {
            if self.send_to_user(*target, event).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Evict connections that have not heartbeated within `timeout`.
    /// Returns the users that went offline as a result.
    pub async fn sweep_idle(&self, timeout: Duration) -> Vec<Uuid> {
        let now = Instant::now();
        let mut users = self.users.write().await;
        let mut went_offline = Vec::new();

        users.retain(|user, entry| {
            entry
                .connections
                .retain(|c| now.duration_since(c.last_seen) < timeout);
            if entry.connections.is_empty() {
                went_offline.push(*user);
                false
            } else {
                true
            }
        });

        if !went_offline.is_empty() {
            debug!(count = went_offline.len(), "presence sweep evicted idle users");
        }
        went_offline
    }

    /// Number of distinct online users.
    pub async fn online_user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Total number of live connections.
    pub async fn connection_count(&self) -> usize {
        let users = self.users.read().await;
        users.values().map(|e| e.connections.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velonet_shared::events::MessageEvent;

    fn message_event(sender: Uuid, recipient: Uuid) -> ServerEvent {
        ServerEvent::NewMessage(MessageEvent {
            id: Uuid::new_v4(),
            sender_id: sender,
            recipient_id: Some(recipient),
            group_id: None,
            body: "on my way".to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn register_and_deliver() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (_, came_online) = hub.register(user, tx).await;
        assert!(came_online);
        assert!(hub.is_online(user).await);

        let event = message_event(Uuid::new_v4(), user);
        assert!(hub.send_to_user(user, &event).await);
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn second_device_does_not_retrigger_online() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let (conn1, first) = hub.register(user, tx1).await;
        let (conn2, second) = hub.register(user, tx2).await;
        assert!(first);
        assert!(!second);
        assert_eq!(hub.connection_count().await, 2);

        // Dropping one device keeps the user online.
        assert!(!hub.remove(user, conn1).await);
        assert!(hub.is_online(user).await);

        // Dropping the last one takes them offline.
        assert!(hub.remove(user, conn2).await);
        assert!(!hub.is_online(user).await);
    }

    #[tokio::test]
    async fn send_to_unknown_user_is_false() {
        let hub = Hub::new();
        let event = message_event(Uuid::new_v4(), Uuid::new_v4());
        assert!(!hub.send_to_user(Uuid::new_v4(), &event).await);
    }

    #[tokio::test]
    async fn dead_receivers_are_pruned_on_send() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(user, tx).await;
        drop(rx);

        let event = message_event(Uuid::new_v4(), user);
        assert!(!hub.send_to_user(user, &event).await);
        assert!(!hub.is_online(user).await);
    }

    #[tokio::test]
    async fn sweep_evicts_silent_connections() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (conn, _) = hub.register(user, tx).await;

        // Nothing to evict with a generous timeout.
        assert!(hub.sweep_idle(Duration::from_secs(60)).await.is_empty());

        // A zero timeout evicts everything immediately.
        let offline = hub.sweep_idle(Duration::ZERO).await;
        assert_eq!(offline, vec![user]);
        assert!(!hub.heartbeat(user, conn).await);
    }

    #[tokio::test]
    async fn heartbeat_refreshes_known_connections_only() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (conn, _) = hub.register(user, tx).await;

        assert!(hub.heartbeat(user, conn).await);
        assert!(!hub.heartbeat(user, Uuid::new_v4()).await);
        assert!(!hub.heartbeat(Uuid::new_v4(), conn).await);
    }

    #[tokio::test]
    async fn status_changes_are_visible() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.register(user, tx).await;

        hub.set_status(user, PresenceStatus::Away).await;
        assert_eq!(hub.status_of(user).await, PresenceStatus::Away);
        assert!(hub.is_online(user).await);
    }
}
