//! Live connection tracking.
//!
//! The session manager owns every attached connection: who it belongs to, the
//! queue its pushes go through, and which rooms it is in. Detaching a
//! connection always drops its room subscriptions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::broadcaster::{Push, PushSender, RoomBroadcaster};
use crate::auth::{Authenticator, Identity};
use crate::{ChatError, Result};

/// Unique identifier of one attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership state of one connection in one room.
///
/// A room that is absent from the connection's map is unjoined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Authorization in flight.
    Joining,
    /// Subscribed; sends are accepted.
    Joined,
}

/// The caller's end of an attached connection.
///
/// Pushes for every joined room arrive through [`recv`](Self::recv) in the
/// order they were committed.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    pushes: mpsc::Receiver<Push>,
}

impl Connection {
    /// Connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated identity.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Authenticated user ID.
    pub fn user_id(&self) -> i64 {
        self.identity.user_id
    }

    /// Wait for the next push. `None` once the connection is detached.
    pub async fn recv(&mut self) -> Option<Push> {
        self.pushes.recv().await
    }

    /// Take a push if one is already queued.
    pub fn try_recv(&mut self) -> Option<Push> {
        self.pushes.try_recv().ok()
    }
}

/// Snapshot of a connection for external queries.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection ID.
    pub id: ConnectionId,
    /// Authenticated identity.
    pub identity: Identity,
    /// Rooms currently joined.
    pub joined_rooms: Vec<i64>,
    /// When the connection attached.
    pub connected_at: DateTime<Utc>,
}

/// Result of starting a join.
#[derive(Debug)]
pub enum JoinTicket {
    /// The connection is already in the room; nothing to do.
    AlreadyJoined,
    /// The room is now `Joining`; the caller must authorize and then
    /// complete or abort.
    Proceed {
        /// Who is joining.
        identity: Identity,
        /// Where pushes for the room should go.
        sender: PushSender,
    },
}

struct ConnectionEntry {
    identity: Identity,
    sender: PushSender,
    rooms: HashMap<i64, RoomState>,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct Sessions {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    by_user: HashMap<i64, HashSet<ConnectionId>>,
}

/// Manager for all attached connections.
pub struct SessionManager {
    authenticator: Arc<dyn Authenticator>,
    broadcaster: Arc<RoomBroadcaster>,
    outbound_buffer: usize,
    sessions: RwLock<Sessions>,
}

impl SessionManager {
    /// Create a session manager.
    ///
    /// `outbound_buffer` bounds how many pushes may wait for one connection.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        broadcaster: Arc<RoomBroadcaster>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            authenticator,
            broadcaster,
            outbound_buffer: outbound_buffer.max(1),
            sessions: RwLock::new(Sessions::default()),
        }
    }

    /// Authenticate a credential and register a new connection.
    pub async fn attach(&self, credential: &str) -> Result<Connection> {
        let identity = self.authenticator.authenticate(credential)?;
        let id = ConnectionId::new();
        let (sender, pushes) = mpsc::channel(self.outbound_buffer);

        let mut sessions = self.sessions.write().await;
        sessions.connections.insert(
            id,
            ConnectionEntry {
                identity,
                sender,
                rooms: HashMap::new(),
                connected_at: Utc::now(),
            },
        );
        sessions
            .by_user
            .entry(identity.user_id)
            .or_default()
            .insert(id);

        info!(
            connection_id = %id,
            user_id = identity.user_id,
            role = %identity.role,
            total = sessions.connections.len(),
            "Connection attached"
        );

        Ok(Connection {
            id,
            identity,
            pushes,
        })
    }

    /// Remove a connection and every room subscription it holds.
    ///
    /// Safe to call more than once; returns true if the connection was attached.
    pub async fn detach(&self, connection_id: ConnectionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions.connections.remove(&connection_id);
            if let Some(entry) = &entry {
                let user_id = entry.identity.user_id;
                if let Some(ids) = sessions.by_user.get_mut(&user_id) {
                    ids.remove(&connection_id);
                    if ids.is_empty() {
                        sessions.by_user.remove(&user_id);
                    }
                }
            }
            entry
        };

        // Unconditional: a join racing with this detach may have subscribed
        // after the entry was removed.
        let rooms = self.broadcaster.remove_connection(connection_id).await;

        match removed {
            Some(entry) => {
                info!(
                    connection_id = %connection_id,
                    user_id = entry.identity.user_id,
                    rooms,
                    "Connection detached"
                );
                true
            }
            None => false,
        }
    }

    /// Identity behind an attached connection.
    pub async fn identity(&self, connection_id: ConnectionId) -> Result<Identity> {
        self.sessions
            .read()
            .await
            .connections
            .get(&connection_id)
            .map(|entry| entry.identity)
            .ok_or_else(|| not_attached(connection_id))
    }

    /// Membership state of a connection in a room (`None` = unjoined).
    pub async fn room_state(&self, connection_id: ConnectionId, conversation_id: i64) -> Option<RoomState> {
        self.sessions
            .read()
            .await
            .connections
            .get(&connection_id)
            .and_then(|entry| entry.rooms.get(&conversation_id).copied())
    }

    /// Start joining a room: unjoined becomes joining.
    pub async fn begin_join(
        &self,
        connection_id: ConnectionId,
        conversation_id: i64,
    ) -> Result<JoinTicket> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .connections
            .get_mut(&connection_id)
            .ok_or_else(|| not_attached(connection_id))?;

        if entry.rooms.get(&conversation_id) == Some(&RoomState::Joined) {
            return Ok(JoinTicket::AlreadyJoined);
        }
        entry.rooms.insert(conversation_id, RoomState::Joining);

        Ok(JoinTicket::Proceed {
            identity: entry.identity,
            sender: entry.sender.clone(),
        })
    }

    /// Finish a join: joining becomes joined.
    ///
    /// Returns false if the connection detached meanwhile.
    pub async fn complete_join(&self, connection_id: ConnectionId, conversation_id: i64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.connections.get_mut(&connection_id) {
            Some(entry) => {
                entry.rooms.insert(conversation_id, RoomState::Joined);
                true
            }
            None => false,
        }
    }

    /// Abandon a join that failed authorization.
    ///
    /// Leaves a room alone if a concurrent join already completed it.
    pub async fn abort_join(&self, connection_id: ConnectionId, conversation_id: i64) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.connections.get_mut(&connection_id) {
            if entry.rooms.get(&conversation_id) == Some(&RoomState::Joining) {
                entry.rooms.remove(&conversation_id);
            }
        }
    }

    /// Mark a room unjoined. Returns true if it was joined or joining.
    pub async fn leave_room(&self, connection_id: ConnectionId, conversation_id: i64) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions
            .connections
            .get_mut(&connection_id)
            .is_some_and(|entry| entry.rooms.remove(&conversation_id).is_some())
    }

    /// Rooms a connection has fully joined.
    pub async fn joined_rooms(&self, connection_id: ConnectionId) -> Vec<i64> {
        let sessions = self.sessions.read().await;
        let mut rooms: Vec<i64> = sessions
            .connections
            .get(&connection_id)
            .map(|entry| {
                entry
                    .rooms
                    .iter()
                    .filter(|(_, state)| **state == RoomState::Joined)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();
        rooms.sort_unstable();
        rooms
    }

    /// Information about one connection.
    pub async fn get(&self, connection_id: ConnectionId) -> Option<ConnectionInfo> {
        let info = {
            let sessions = self.sessions.read().await;
            let entry = sessions.connections.get(&connection_id)?;
            ConnectionInfo {
                id: connection_id,
                identity: entry.identity,
                joined_rooms: Vec::new(),
                connected_at: entry.connected_at,
            }
        };
        Some(ConnectionInfo {
            joined_rooms: self.joined_rooms(connection_id).await,
            ..info
        })
    }

    /// Number of attached connections.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.connections.len()
    }

    /// Connections currently held by a user.
    pub async fn connections_of(&self, user_id: i64) -> Vec<ConnectionId> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<ConnectionId> = sessions
            .by_user
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Whether a user has at least one attached connection.
    pub async fn is_user_online(&self, user_id: i64) -> bool {
        self.sessions.read().await.by_user.contains_key(&user_id)
    }
}

fn not_attached(connection_id: ConnectionId) -> ChatError {
    debug!(connection_id = %connection_id, "Request on unknown connection");
    ChatError::InvalidState(format!("connection {connection_id} is not attached"))
}
