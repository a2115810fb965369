//! Item version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::{ItemId, RoomId, VersionId};

use crate::item::payload::ItemPayload;

/// An immutable snapshot of an item's content at a point in time.
///
/// Version numbers for one item form a contiguous strictly increasing
/// sequence starting at 1; pruning removes only the oldest entries, never
/// holes in the middle of the surviving set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Unique version identifier.
    pub id: VersionId,
    /// The item this version belongs to.
    pub item_id: ItemId,
    /// The room containing the item.
    pub room_id: RoomId,
    /// Sequential version number, starting at 1.
    pub version: i64,
    /// Snapshot of the item content.
    pub payload: ItemPayload,
    /// External identity of the author, if known.
    pub author: Option<String>,
    /// Computed byte size of the snapshot.
    pub size_bytes: i64,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// Build a snapshot of the given payload at the given version number.
    pub fn snapshot(
        item_id: ItemId,
        room_id: RoomId,
        version: i64,
        payload: ItemPayload,
        author: Option<String>,
    ) -> Self {
        let size_bytes = payload.size_bytes();
        Self {
            id: VersionId::new(),
            item_id,
            room_id,
            version,
            payload,
            author,
            size_bytes,
            created_at: Utc::now(),
        }
    }
}
