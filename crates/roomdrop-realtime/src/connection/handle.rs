//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::types::ServerEvent;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing events to the client, plus
/// metadata about the connected peer.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Peer identity from the external auth layer.
    pub peer_id: String,
    /// Display name, if the peer provided one.
    pub display_name: Option<String>,
    /// Sender for outbound events.
    pub sender: mpsc::Sender<ServerEvent>,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    /// Whether the connection is still alive.
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle.
    pub fn new(
        peer_id: String,
        display_name: Option<String>,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_id,
            display_name,
            sender,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    /// Send an event to this connection. Delivery is at-most-once: a full
    /// buffer drops the event, a closed channel marks the connection dead.
    pub fn send(&self, event: ServerEvent) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Connection send buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if the connection is alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the connection as dead.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_while_alive() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new("peer-1".to_string(), None, tx);

        assert!(handle.send(ServerEvent::Pong));
        assert!(matches!(rx.recv().await, Some(ServerEvent::Pong)));
    }

    #[tokio::test]
    async fn test_send_after_close_marks_dead() {
        let (tx, rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new("peer-1".to_string(), None, tx);
        drop(rx);

        assert!(!handle.send(ServerEvent::Pong));
        assert!(!handle.is_alive());
    }
}
