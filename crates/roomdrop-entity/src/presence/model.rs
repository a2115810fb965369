//! Presence entry value object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One peer currently connected to a room.
///
/// Ephemeral and room-scoped: destroyed on disconnect or explicit leave,
/// never persisted. A process restart clears all presence; clients
/// re-announce on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Peer identity supplied by the external auth layer.
    pub peer_id: String,
    /// Display name, if the peer provided one.
    pub display_name: Option<String>,
    /// When the peer joined the room.
    pub joined_at: DateTime<Utc>,
}

impl PresenceEntry {
    /// Create an entry with a fresh join timestamp.
    pub fn new(peer_id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name,
            joined_at: Utc::now(),
        }
    }
}
