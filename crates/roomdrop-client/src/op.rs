//! Queued operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::AppError;
use roomdrop_core::types::id::{ItemId, UploadId};
use roomdrop_entity::item::ItemPayload;

/// An operation staged while offline, replayed against the server on drain.
///
/// Creates carry a client-generated item id, which is what makes their
/// replay idempotent on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Create an item in a room.
    CreateItem {
        /// Target room code.
        room_code: String,
        /// Client-generated item id.
        item_id: ItemId,
        /// Item content.
        payload: ItemPayload,
        /// Optional parent item.
        parent_id: Option<ItemId>,
    },
    /// Replace an item's content (last-writer-wins).
    UpdateItem {
        /// Room the item lives in (kept for display and scoping).
        room_code: String,
        /// Item to update.
        item_id: ItemId,
        /// Replacement content.
        payload: ItemPayload,
    },
    /// Delete an item.
    DeleteItem {
        /// Room the item lives in.
        room_code: String,
        /// Item to delete.
        item_id: ItemId,
    },
    /// Upload one chunk of a resumable transfer.
    UploadChunk {
        /// Room the upload targets.
        room_code: String,
        /// The upload ledger.
        upload_id: UploadId,
        /// Zero-based chunk index.
        index: i32,
        /// Chunk bytes.
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl Operation {
    /// Short kind name for storage and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateItem { .. } => "create_item",
            Self::UpdateItem { .. } => "update_item",
            Self::DeleteItem { .. } => "delete_item",
            Self::UploadChunk { .. } => "upload_chunk",
        }
    }

    /// The room this operation targets.
    pub fn room_code(&self) -> &str {
        match self {
            Self::CreateItem { room_code, .. }
            | Self::UpdateItem { room_code, .. }
            | Self::DeleteItem { room_code, .. }
            | Self::UploadChunk { room_code, .. } => room_code,
        }
    }

    /// Ordering key: operations sharing a key must replay in enqueue order;
    /// operations with different keys are independent.
    pub fn resource_key(&self) -> String {
        match self {
            Self::CreateItem { item_id, .. }
            | Self::UpdateItem { item_id, .. }
            | Self::DeleteItem { item_id, .. } => item_id.to_string(),
            Self::UploadChunk { upload_id, .. } => upload_id.to_string(),
        }
    }
}

/// Status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    /// Waiting for a drain.
    Pending,
    /// Currently being replayed.
    Syncing,
    /// Permanently failed; surfaced for manual re-attempt or discard.
    Failed,
    /// Acknowledged by the server (removed from the queue shortly after).
    Done,
}

impl OpStatus {
    /// String form for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }
}

impl std::str::FromStr for OpStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "failed" => Ok(Self::Failed),
            "done" => Ok(Self::Done),
            _ => Err(AppError::validation(format!("Invalid op status: '{s}'"))),
        }
    }
}

/// One durable row of the reconciliation queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Enqueue sequence number (rowid); drains process in this order.
    pub seq: i64,
    /// The staged operation.
    pub op: Operation,
    /// When the operation was staged.
    pub created_at: DateTime<Utc>,
    /// Transient retry attempts so far.
    pub retry_count: u32,
    /// Current queue status.
    pub status: OpStatus,
    /// Message from the most recent failure, if any.
    pub last_error: Option<String>,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}
