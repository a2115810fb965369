//! Inbound and outbound WebSocket event type definitions.
//!
//! Event names on the wire use the `domain:action` convention
//! (`room:join`, `item:created`, `signal:relay`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::ItemId;
use roomdrop_entity::item::{Item, ItemPayload};
use roomdrop_entity::presence::PresenceEntry;

/// Events sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Announce this peer in a room (implicit at connection upgrade, but
    /// also accepted as an explicit re-announce after reconnect).
    #[serde(rename = "room:join")]
    RoomJoin {
        /// Room code to join.
        room_code: String,
        /// Peer identity from the external auth layer.
        peer_id: String,
        /// Optional display name.
        display_name: Option<String>,
    },
    /// Leave the current room.
    #[serde(rename = "room:leave")]
    RoomLeave,
    /// Create an item in the current room.
    #[serde(rename = "item:create")]
    ItemCreate {
        /// Client-generated item id, which makes offline replays idempotent.
        item_id: Option<ItemId>,
        /// Item content.
        payload: ItemPayload,
        /// Optional parent item.
        parent_id: Option<ItemId>,
    },
    /// Update an item (last-writer-wins at item granularity).
    #[serde(rename = "item:update")]
    ItemUpdate {
        /// Item to update.
        item_id: ItemId,
        /// Replacement content.
        payload: ItemPayload,
    },
    /// Delete an item.
    #[serde(rename = "item:delete")]
    ItemDelete {
        /// Item to delete.
        item_id: ItemId,
    },
    /// Relay an opaque signaling payload to one peer or the whole room.
    /// The engine never interprets the payload.
    #[serde(rename = "signal:relay")]
    SignalRelay {
        /// Opaque payload.
        payload: serde_json::Value,
        /// Target peer, or `None` to reach the whole room.
        target_peer_id: Option<String>,
    },
    /// Keepalive.
    #[serde(rename = "ping")]
    Ping,
}

/// Events sent by the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A peer joined the room.
    #[serde(rename = "room:peer-joined")]
    PeerJoined {
        /// Peer identity.
        peer_id: String,
        /// Display name, if provided.
        display_name: Option<String>,
        /// Join timestamp.
        joined_at: DateTime<Utc>,
    },
    /// A peer left the room.
    #[serde(rename = "room:peer-left")]
    PeerLeft {
        /// Peer identity.
        peer_id: String,
    },
    /// Presence snapshot, sent once on (re)subscribe.
    #[serde(rename = "room:peers")]
    Peers {
        /// All peers currently in the room.
        peers: Vec<PresenceEntry>,
    },
    /// An item was created.
    #[serde(rename = "item:created")]
    ItemCreated {
        /// The new item.
        item: Item,
    },
    /// An item was updated.
    #[serde(rename = "item:updated")]
    ItemUpdated {
        /// The updated item.
        item: Item,
    },
    /// An item was deleted.
    #[serde(rename = "item:deleted")]
    ItemDeleted {
        /// The deleted item's id.
        item_id: ItemId,
    },
    /// A relayed signaling payload.
    #[serde(rename = "signal:relay")]
    SignalRelay {
        /// Opaque payload.
        payload: serde_json::Value,
        /// Originating peer.
        from_peer_id: String,
    },
    /// An error related to the last inbound event.
    #[serde(rename = "error")]
    Error {
        /// Machine-readable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// Keepalive response.
    #[serde(rename = "pong")]
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_event_names() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"room:join","room_code":"ABCD2345","peer_id":"p1","display_name":"Ada"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::RoomJoin { .. }));

        let event: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn test_outbound_event_names() {
        let json = serde_json::to_value(ServerEvent::PeerLeft {
            peer_id: "p1".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "room:peer-left");

        let json = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(json["type"], "pong");
    }

    #[test]
    fn test_signal_payload_is_opaque() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"signal:relay","payload":{"sdp":"v=0 ..."},"target_peer_id":null}"#,
        )
        .unwrap();
        let ClientEvent::SignalRelay { payload, target_peer_id } = event else {
            panic!("wrong variant");
        };
        assert_eq!(payload["sdp"], "v=0 ...");
        assert!(target_peer_id.is_none());
    }
}
