//! Store traits the service layer programs against.
//!
//! Both backends must uphold the same atomicity contracts, documented per
//! method. Errors are classified into the application taxonomy at this
//! boundary: callers never see backend-specific error types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId, UploadId};
use roomdrop_entity::item::Item;
use roomdrop_entity::room::{Room, RoomCode};
use roomdrop_entity::upload::{Upload, UploadStatus};
use roomdrop_entity::version::Version;

/// Persistence operations for rooms.
#[async_trait]
pub trait RoomStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new room. Fails with `Conflict` if the code is taken.
    async fn create(&self, room: &Room) -> AppResult<Room>;

    /// Find a room by its identifier, including soft-deleted rooms.
    async fn find_by_id(&self, id: RoomId) -> AppResult<Option<Room>>;

    /// Find a room by its canonical code, including soft-deleted rooms.
    async fn find_by_code(&self, code: &RoomCode) -> AppResult<Option<Room>>;

    /// Record activity in the room.
    async fn touch_activity(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<()>;

    /// Soft-delete a room. Returns `false` if it was already deleted or
    /// does not exist.
    async fn soft_delete(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<bool>;

    /// Soft-delete every room whose hard expiry has passed and return the
    /// rooms affected, so the caller can destroy dependent state.
    async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<Room>>;
}

/// Persistence operations for items.
#[async_trait]
pub trait ItemStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new item. Fails with `Conflict` if the id already exists
    /// (replayed offline creates carry client-generated ids).
    async fn insert(&self, item: &Item) -> AppResult<Item>;

    /// Find an item by id.
    async fn find_by_id(&self, id: ItemId) -> AppResult<Option<Item>>;

    /// List all items of a room, oldest first.
    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Item>>;

    /// Count items in a room.
    async fn count_by_room(&self, room_id: RoomId) -> AppResult<u64>;

    /// Replace an item (last-writer-wins at item granularity). Fails with
    /// `NotFound` if the item no longer exists.
    async fn update(&self, item: &Item) -> AppResult<Item>;

    /// Delete an item. Returns `false` if it did not exist.
    async fn delete(&self, id: ItemId) -> AppResult<bool>;

    /// Delete all items of a room. Returns the number removed.
    async fn delete_by_room(&self, room_id: RoomId) -> AppResult<u64>;
}

/// Persistence operations for chunk ledgers.
#[async_trait]
pub trait UploadStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new ledger with all chunk slots unfilled.
    async fn create(&self, upload: &Upload) -> AppResult<Upload>;

    /// Find a ledger by id.
    async fn find(&self, id: UploadId) -> AppResult<Option<Upload>>;

    /// Acknowledge one chunk. This is the atomic check-and-set at the heart
    /// of the ledger; the entire decision happens under the storage layer's
    /// conditional-update guarantee:
    ///
    /// - unknown id → `NotFound` (a reaped upload is indistinguishable from
    ///   one that never existed),
    /// - index outside `[0, total_chunks)` → `Validation`,
    /// - `expires_at <= now` → `Expired`,
    /// - terminal status → `Conflict`,
    /// - already-acknowledged chunk → no-op success (first etag wins),
    /// - otherwise the slot is marked uploaded and `Pending` ledgers move
    ///   to `Uploading`.
    ///
    /// Returns the ledger as of after the call.
    async fn mark_chunk(
        &self,
        id: UploadId,
        index: i32,
        etag: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Upload>;

    /// Unconditionally set a ledger's status. Returns `false` for unknown
    /// ids.
    async fn set_status(&self, id: UploadId, status: UploadStatus) -> AppResult<bool>;

    /// Transition a non-terminal ledger to `Completed` and record the
    /// materialized item. Returns `false` if another caller already
    /// completed (or otherwise terminated) the ledger.
    async fn complete(&self, id: UploadId, item_id: ItemId) -> AppResult<bool>;

    /// Ledgers subject to reaping: status ∈ {Pending, Uploading} with
    /// `expires_at` in the past.
    async fn find_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Upload>>;

    /// All ledgers belonging to a room (used when a room is destroyed).
    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Upload>>;

    /// Delete a ledger outright. Returns `false` if it did not exist.
    async fn delete(&self, id: UploadId) -> AppResult<bool>;
}

/// Persistence operations for item version history.
#[async_trait]
pub trait VersionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a snapshot at exactly `version.version`. Fails with
    /// `Conflict` if that `(item_id, version)` pair is already taken —
    /// enforced by a uniqueness constraint, which is what makes concurrent
    /// appends safe across replicas.
    async fn append(&self, version: &Version) -> AppResult<Version>;

    /// Highest version number for an item (0 if none).
    async fn max_version(&self, item_id: ItemId) -> AppResult<i64>;

    /// The highest-numbered version, if any.
    async fn latest(&self, item_id: ItemId) -> AppResult<Option<Version>>;

    /// The most recent `limit` versions, newest first.
    async fn history(&self, item_id: ItemId, limit: u32) -> AppResult<Vec<Version>>;

    /// Delete all but the `keep` newest versions. Never renumbers the
    /// survivors. Returns the count removed.
    async fn prune(&self, item_id: ItemId, keep: u32) -> AppResult<u64>;

    /// Remove an item's entire history. Returns the count removed.
    async fn delete_by_item(&self, item_id: ItemId) -> AppResult<u64>;

    /// Distinct items that currently have any history (retention sweep).
    async fn item_ids_with_history(&self) -> AppResult<Vec<ItemId>>;
}
