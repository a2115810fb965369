//! Request DTOs, validated with `validator` before reaching the services.

use serde::Deserialize;
use validator::Validate;

use roomdrop_core::types::id::ItemId;
use roomdrop_entity::item::ItemPayload;
use roomdrop_entity::room::{RoomAccess, RoomLifespan, RoomMode, RoomSettings};

/// Body of `POST /api/rooms`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    /// Network scope.
    pub mode: RoomMode,
    /// Access policy.
    pub access: RoomAccess,
    /// Lifespan policy.
    pub lifespan: RoomLifespan,
    /// Plaintext room password; required iff access is `password`.
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    /// Settings overrides (server defaults apply when absent).
    pub settings: Option<RoomSettings>,
}

/// Body of `POST /api/rooms/{code}/items`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    /// Client-generated item id; offline replays carry one so the create
    /// is idempotent.
    pub item_id: Option<ItemId>,
    /// Item content.
    pub payload: ItemPayload,
    /// Optional parent item.
    pub parent_id: Option<ItemId>,
}

/// Body of `PUT /api/items/{id}`.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    /// Replacement content (last-writer-wins at item granularity).
    pub payload: ItemPayload,
}

/// Body of `POST /api/uploads/init`.
#[derive(Debug, Deserialize, Validate)]
pub struct InitUploadRequest {
    /// Target room code.
    #[validate(length(min = 8, max = 8))]
    pub room_code: String,
    /// Intended file name.
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    /// MIME type.
    #[validate(length(min = 1, max = 255))]
    pub mime_type: String,
    /// Declared total size in bytes.
    #[validate(range(min = 1))]
    pub size: i64,
    /// Number of chunks the client will send.
    #[validate(range(min = 1))]
    pub total_chunks: i32,
    /// Whether the content is encrypted client-side.
    #[serde(default)]
    pub encrypted: bool,
    /// Base64 initialization vector for encrypted content.
    pub iv: Option<String>,
    /// Identifier of an external multi-part transfer, if one backs this
    /// upload.
    pub external_transfer_id: Option<String>,
}

/// Query of `GET /api/items/{id}/versions`.
#[derive(Debug, Deserialize, Validate)]
pub struct VersionHistoryQuery {
    /// Maximum versions to return, newest first.
    #[serde(default = "default_history_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    10
}
