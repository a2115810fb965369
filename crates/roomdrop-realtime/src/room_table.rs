//! Per-room subscriber and presence table.
//!
//! One dashmap entry per room holds both the fan-out set and the presence
//! entries, so a join can subscribe, announce, and snapshot inside a single
//! critical section: the snapshot a joining client receives can neither
//! miss a peer already present nor include one that left before the join
//! completed.
//!
//! `publish` fans out while holding the room's entry guard. Sends are
//! non-blocking (`try_send`), so no lock is held across I/O, and events
//! published to the same room are observed by every subscriber in the
//! order published (per-room FIFO). No ordering holds across rooms.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use roomdrop_entity::presence::PresenceEntry;

use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::message::types::ServerEvent;

/// Fan-out set and presence for one room.
#[derive(Debug, Default)]
struct RoomEntry {
    /// Live subscribed connections.
    subscribers: HashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// Current presence, keyed by peer identity.
    peers: HashMap<String, PresenceEntry>,
}

impl RoomEntry {
    fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut peers: Vec<PresenceEntry> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.peer_id.cmp(&b.peer_id)));
        peers
    }

    fn fan_out(&self, event: &ServerEvent, exclude: Option<ConnectionId>) {
        for (conn_id, handle) in &self.subscribers {
            if Some(*conn_id) == exclude {
                continue;
            }
            handle.send(event.clone());
        }
    }
}

/// Concurrency-safe table of room state, keyed by canonical room code.
#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: DashMap<String, RoomEntry>,
    /// Reverse index: connection → rooms it subscribed to.
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl RoomTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection, announce its peer, and return the presence
    /// snapshot, all atomically with respect to other joins and leaves in
    /// the same room.
    ///
    /// Re-joining replaces the peer's presence entry with a fresh join
    /// timestamp. The `room:peer-joined` event goes to the rest of the
    /// room only.
    pub fn join(&self, room_code: &str, handle: Arc<ConnectionHandle>) -> Vec<PresenceEntry> {
        let mut entry = self.rooms.entry(room_code.to_string()).or_default();

        let presence = PresenceEntry::new(handle.peer_id.clone(), handle.display_name.clone());
        let joined = ServerEvent::PeerJoined {
            peer_id: presence.peer_id.clone(),
            display_name: presence.display_name.clone(),
            joined_at: presence.joined_at,
        };
        entry.fan_out(&joined, Some(handle.id));

        entry.peers.insert(presence.peer_id.clone(), presence);
        entry.subscribers.insert(handle.id, handle.clone());
        let snapshot = entry.snapshot();
        drop(entry);

        self.memberships
            .entry(handle.id)
            .or_default()
            .insert(room_code.to_string());

        debug!(room = room_code, peer = %handle.peer_id, "Peer joined room");
        snapshot
    }

    /// Remove a connection from one room. The peer's presence goes away
    /// (and `room:peer-left` fires) only when no other connection of the
    /// same peer remains subscribed.
    pub fn leave(&self, room_code: &str, conn_id: ConnectionId) {
        if let Some(mut channels) = self.memberships.get_mut(&conn_id) {
            channels.remove(room_code);
        }
        let Some(mut entry) = self.rooms.get_mut(room_code) else {
            return;
        };
        let Some(handle) = entry.subscribers.remove(&conn_id) else {
            return;
        };

        let peer_still_connected = entry
            .subscribers
            .values()
            .any(|h| h.peer_id == handle.peer_id);
        if !peer_still_connected && entry.peers.remove(&handle.peer_id).is_some() {
            let left = ServerEvent::PeerLeft {
                peer_id: handle.peer_id.clone(),
            };
            entry.fan_out(&left, None);
            debug!(room = room_code, peer = %handle.peer_id, "Peer left room");
        }

        if entry.subscribers.is_empty() && entry.peers.is_empty() {
            drop(entry);
            self.rooms
                .remove_if(room_code, |_, e| e.subscribers.is_empty() && e.peers.is_empty());
        }
    }

    /// Remove a connection from every room it was part of (abrupt
    /// disconnects).
    pub fn unsubscribe_all(&self, conn_id: ConnectionId) {
        let rooms = self
            .memberships
            .remove(&conn_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();
        for room_code in rooms {
            self.leave(&room_code, conn_id);
        }
    }

    /// Current presence of a room.
    pub fn snapshot(&self, room_code: &str) -> Vec<PresenceEntry> {
        self.rooms
            .get(room_code)
            .map(|e| e.snapshot())
            .unwrap_or_default()
    }

    /// Deliver an event to every subscriber of a room.
    pub fn publish(&self, room_code: &str, event: ServerEvent) {
        if let Some(entry) = self.rooms.get(room_code) {
            entry.fan_out(&event, None);
        }
    }

    /// Deliver an event to every subscriber except one connection
    /// (typically the originator).
    pub fn publish_except(&self, room_code: &str, exclude: ConnectionId, event: ServerEvent) {
        if let Some(entry) = self.rooms.get(room_code) {
            entry.fan_out(&event, Some(exclude));
        }
    }

    /// Relay an opaque signaling payload. With a target peer the event
    /// reaches only that peer's connections; without one it reaches the
    /// whole room except the sender.
    pub fn relay(
        &self,
        room_code: &str,
        from: &ConnectionHandle,
        target_peer_id: Option<&str>,
        payload: serde_json::Value,
    ) {
        let Some(entry) = self.rooms.get(room_code) else {
            return;
        };
        let event = ServerEvent::SignalRelay {
            payload,
            from_peer_id: from.peer_id.clone(),
        };
        match target_peer_id {
            Some(target) => {
                for handle in entry.subscribers.values() {
                    if handle.peer_id == target {
                        handle.send(event.clone());
                    }
                }
            }
            None => entry.fan_out(&event, Some(from.id)),
        }
    }

    /// Number of rooms with any subscriber or peer.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of subscribed connections in one room.
    pub fn subscriber_count(&self, room_code: &str) -> usize {
        self.rooms
            .get(room_code)
            .map(|e| e.subscribers.len())
            .unwrap_or(0)
    }
}
