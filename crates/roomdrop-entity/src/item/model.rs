//! Item entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::{ItemId, RoomId};

use super::payload::ItemPayload;

/// One shared unit of content inside a room.
///
/// Items belong to exactly one room. File items may nest under a parent
/// folder item. The room owns its items; each item owns its version
/// history and, when file-backed, its chunk ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item identifier.
    pub id: ItemId,
    /// The room containing this item.
    pub room_id: RoomId,
    /// Type-discriminated content.
    pub payload: ItemPayload,
    /// Optional parent item (file-under-folder hierarchies).
    pub parent_id: Option<ItemId>,
    /// External identity of the creating peer, if known.
    pub created_by: Option<String>,
    /// Current version number (matches the highest version snapshot).
    pub current_version: i64,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last updated.
    pub updated_at: DateTime<Utc>,
}
