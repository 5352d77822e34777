//! Room fan-out.
//!
//! Each room is a set of subscribed connections. Publishing pushes a message
//! into every subscriber's outbound queue without waiting on the network; the
//! connection's own task drains the queue to its socket.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::message::Message;
use super::session::ConnectionId;

/// Server-initiated event delivered to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    /// A message was committed to a room the connection has joined.
    NewMessage(Message),
}

/// Handle used to enqueue pushes for one connection.
pub type PushSender = mpsc::Sender<Push>;

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose queue accepted the push.
    pub delivered: usize,
    /// Subscribers skipped because their queue was full or closed.
    pub dropped: usize,
}

/// Maps conversation id to the connections subscribed to it.
///
/// Holds only push handles, never the connections themselves.
#[derive(Default)]
pub struct RoomBroadcaster {
    rooms: RwLock<HashMap<i64, HashMap<ConnectionId, PushSender>>>,
}

impl RoomBroadcaster {
    /// Create an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room.
    ///
    /// Returns true if newly subscribed, false if it already was.
    pub async fn join(
        &self,
        conversation_id: i64,
        connection_id: ConnectionId,
        sender: PushSender,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(conversation_id).or_default();
        if room.contains_key(&connection_id) {
            return false;
        }
        room.insert(connection_id, sender);
        debug!(
            conversation_id,
            %connection_id,
            subscribers = room.len(),
            "Subscribed to room"
        );
        true
    }

    /// Unsubscribe a connection from a room.
    ///
    /// Returns true if it was subscribed.
    pub async fn leave(&self, conversation_id: i64, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&conversation_id) else {
            return false;
        };
        let removed = room.remove(&connection_id).is_some();
        if room.is_empty() {
            rooms.remove(&conversation_id);
        }
        if removed {
            debug!(conversation_id, %connection_id, "Unsubscribed from room");
        }
        removed
    }

    /// Drop every subscription of a connection.
    ///
    /// Returns the number of rooms it was removed from.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut removed = 0;
        rooms.retain(|_, room| {
            if room.remove(&connection_id).is_some() {
                removed += 1;
            }
            !room.is_empty()
        });
        removed
    }

    /// Deliver a message to the room's current subscribers, sender included.
    ///
    /// Works on a snapshot taken at call time. A subscriber whose queue is
    /// full or already closed misses this push and must catch up through
    /// history; that never fails the publish.
    pub async fn publish(&self, conversation_id: i64, message: &Message) -> PublishReport {
        let subscribers: Vec<(ConnectionId, PushSender)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&conversation_id) {
                Some(room) => room.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return PublishReport::default(),
            }
        };

        let mut report = PublishReport::default();
        for (connection_id, sender) in subscribers {
            match sender.try_send(Push::NewMessage(message.clone())) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(
                        conversation_id,
                        %connection_id,
                        message_id = message.id,
                        "Outbound queue full, push dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    debug!(
                        conversation_id,
                        %connection_id,
                        message_id = message.id,
                        "Connection closing, push dropped"
                    );
                }
            }
        }
        report
    }

    /// Number of subscribers of a room.
    pub async fn subscriber_count(&self, conversation_id: i64) -> usize {
        self.rooms
            .read()
            .await
            .get(&conversation_id)
            .map_or(0, HashMap::len)
    }

    /// Whether a connection is subscribed to a room.
    pub async fn is_subscribed(
        &self,
        conversation_id: i64,
        connection_id: ConnectionId,
    ) -> bool {
        self.rooms
            .read()
            .await
            .get(&conversation_id)
            .is_some_and(|room| room.contains_key(&connection_id))
    }

    /// Number of rooms with at least one subscriber.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
