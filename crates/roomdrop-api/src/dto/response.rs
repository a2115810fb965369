//! Response DTOs.
//!
//! Items and versions serialize as their entities; rooms and uploads get
//! dedicated shapes (rooms to keep credentials server-side, uploads to
//! carry the derived progress fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::{RoomId, UploadId};
use roomdrop_entity::room::{Room, RoomAccess, RoomCode, RoomLifespan, RoomMode, RoomSettings};
use roomdrop_entity::upload::{Upload, UploadStatus};

/// A room as presented to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    /// Unique room identifier.
    pub id: RoomId,
    /// Canonical join code.
    pub code: RoomCode,
    /// Network scope.
    pub mode: RoomMode,
    /// Access policy.
    pub access: RoomAccess,
    /// Lifespan policy.
    pub lifespan: RoomLifespan,
    /// External identity of the owner, if any.
    pub owner: Option<String>,
    /// Limits and policies.
    pub settings: RoomSettings,
    /// Last activity timestamp.
    pub last_activity_at: DateTime<Utc>,
    /// Hard expiry, if the room is temporary.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            code: room.code,
            mode: room.mode,
            access: room.access,
            lifespan: room.lifespan,
            owner: room.owner,
            settings: room.settings,
            last_activity_at: room.last_activity_at,
            expires_at: room.expires_at,
            created_at: room.created_at,
        }
    }
}

/// Response of `POST /api/uploads/init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitUploadResponse {
    /// The new upload ledger.
    pub upload_id: UploadId,
    /// Byte size clients should slice chunks at.
    pub chunk_size: u64,
    /// Number of chunks expected.
    pub total_chunks: i32,
    /// Per-chunk PUT targets, indexed by chunk number.
    pub chunk_upload_targets: Vec<String>,
    /// Hard expiry of the transfer.
    pub expires_at: DateTime<Utc>,
}

/// Response of per-chunk PUTs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAckResponse {
    /// Acknowledged chunk index.
    pub index: i32,
    /// Entity tag of the stored bytes.
    pub etag: String,
    /// Progress after this ack, 0–100.
    pub progress: u8,
    /// Whether every chunk is now acknowledged.
    pub complete: bool,
}

/// Upload progress as reported by `GET /api/uploads/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    /// The upload ledger.
    pub upload_id: UploadId,
    /// Current lifecycle status.
    pub status: UploadStatus,
    /// Progress, 0–100.
    pub progress: u8,
    /// Whether every chunk is acknowledged.
    pub complete: bool,
    /// Chunks acknowledged so far.
    pub uploaded_chunks: usize,
    /// Chunks expected in total.
    pub total_chunks: i32,
    /// Hard expiry of the transfer.
    pub expires_at: DateTime<Utc>,
}

impl From<Upload> for UploadStatusResponse {
    fn from(upload: Upload) -> Self {
        Self {
            upload_id: upload.id,
            status: upload.status,
            progress: upload.progress(),
            complete: upload.is_complete(),
            uploaded_chunks: upload.uploaded_count(),
            total_chunks: upload.total_chunks,
            expires_at: upload.expires_at,
        }
    }
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status, `ok` or `degraded`.
    pub status: String,
    /// Whether chunk storage is reachable.
    pub storage: bool,
}
