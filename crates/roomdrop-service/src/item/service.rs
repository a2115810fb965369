//! Item service — create/update/delete with last-writer-wins semantics.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::ItemId;
use roomdrop_database::store::ItemStore;
use roomdrop_entity::item::{Item, ItemPayload};
use roomdrop_entity::room::Room;

use crate::context::RequestContext;

use super::versions::VersionService;

/// Handles item mutation inside a room.
///
/// Conflict resolution is last-writer-wins at item granularity; the version
/// log, not bus delivery order, is authoritative for conflict detection.
#[derive(Clone)]
pub struct ItemService {
    items: Arc<dyn ItemStore>,
    versions: VersionService,
}

impl std::fmt::Debug for ItemService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemService").finish()
    }
}

impl ItemService {
    /// Creates a new item service.
    pub fn new(items: Arc<dyn ItemStore>, versions: VersionService) -> Self {
        Self { items, versions }
    }

    /// The version sub-service.
    pub fn versions(&self) -> &VersionService {
        &self.versions
    }

    /// Creates an item in a room and records version 1.
    ///
    /// `item_id` may be client-generated (offline queue replays); replaying
    /// a create for an id that already exists returns the existing item
    /// instead of failing, which is what makes the replay idempotent. The
    /// replay is resolved before the cap and parent preconditions: those
    /// guard new inserts only, and may have legitimately changed since the
    /// original create succeeded (the accepted item itself counts toward
    /// the cap, and its parent may since have been deleted).
    pub async fn create_item(
        &self,
        ctx: &RequestContext,
        room: &Room,
        item_id: Option<ItemId>,
        payload: ItemPayload,
        parent_id: Option<ItemId>,
    ) -> AppResult<Item> {
        if let Some(id) = item_id {
            if let Some(existing) = self.items.find_by_id(id).await? {
                if existing.room_id != room.id {
                    return Err(AppError::conflict(format!(
                        "Item {id} already exists in another room"
                    )));
                }
                return Ok(existing);
            }
        }

        let count = self.items.count_by_room(room.id).await?;
        if count >= room.settings.max_items as u64 {
            return Err(AppError::validation(format!(
                "Room {} is at its limit of {} items",
                room.code, room.settings.max_items
            )));
        }

        if let Some(parent) = parent_id {
            let parent_item = self
                .items
                .find_by_id(parent)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Parent item {parent} not found")))?;
            if parent_item.room_id != room.id {
                return Err(AppError::validation(
                    "Parent item belongs to a different room",
                ));
            }
        }

        let now = Utc::now();
        let item = Item {
            id: item_id.unwrap_or_default(),
            room_id: room.id,
            payload,
            parent_id,
            created_by: ctx.peer_id.clone(),
            current_version: 1,
            created_at: now,
            updated_at: now,
        };

        let created = match self.items.insert(&item).await {
            Ok(created) => created,
            Err(e) if e.kind == ErrorKind::Conflict => {
                // A concurrent replay of the same create won the insert
                // between the lookup above and here; hand back its item.
                let existing = self
                    .items
                    .find_by_id(item.id)
                    .await?
                    .ok_or_else(|| AppError::conflict(format!("Item {} already exists", item.id)))?;
                if existing.room_id != room.id {
                    return Err(AppError::conflict(format!(
                        "Item {} already exists in another room",
                        item.id
                    )));
                }
                return Ok(existing);
            }
            Err(e) => return Err(e),
        };

        self.versions
            .append_next(
                created.id,
                created.room_id,
                created.payload.clone(),
                ctx.peer_id.clone(),
            )
            .await?;

        info!(
            room = %room.code,
            item = %created.id,
            kind = created.payload.kind(),
            "Item created"
        );
        Ok(created)
    }

    /// Replaces an item's content (last-writer-wins), appending a version.
    pub async fn update_item(
        &self,
        ctx: &RequestContext,
        room: &Room,
        item_id: ItemId,
        payload: ItemPayload,
    ) -> AppResult<Item> {
        let mut item = self
            .items
            .find_by_id(item_id)
            .await?
            .filter(|i| i.room_id == room.id)
            .ok_or_else(|| AppError::not_found(format!("Item {item_id} not found")))?;

        let version = self
            .versions
            .append_next(item.id, item.room_id, payload.clone(), ctx.peer_id.clone())
            .await?;

        item.payload = payload;
        item.current_version = version.version;
        item.updated_at = Utc::now();
        let updated = self.items.update(&item).await?;

        // Enforce retention on the hot path; the periodic sweep is a
        // backstop for items mutated by other replicas.
        self.versions
            .prune(item.id, room.settings.version_retention)
            .await?;

        info!(
            room = %room.code,
            item = %updated.id,
            version = updated.current_version,
            "Item updated"
        );
        Ok(updated)
    }

    /// Deletes an item and its version history.
    ///
    /// Deleting an already-deleted item succeeds (idempotent replay).
    pub async fn delete_item(&self, room: &Room, item_id: ItemId) -> AppResult<bool> {
        if let Some(item) = self.items.find_by_id(item_id).await? {
            if item.room_id != room.id {
                return Err(AppError::not_found(format!("Item {item_id} not found")));
            }
        }
        let deleted = self.items.delete(item_id).await?;
        self.versions.delete_history(item_id).await?;
        if deleted {
            info!(room = %room.code, item = %item_id, "Item deleted");
        }
        Ok(deleted)
    }

    /// Fetches one item of a room.
    pub async fn get_item(&self, room: &Room, item_id: ItemId) -> AppResult<Item> {
        self.items
            .find_by_id(item_id)
            .await?
            .filter(|i| i.room_id == room.id)
            .ok_or_else(|| AppError::not_found(format!("Item {item_id} not found")))
    }

    /// Lists all items of a room, oldest first.
    pub async fn list_items(&self, room: &Room) -> AppResult<Vec<Item>> {
        self.items.list_by_room(room.id).await
    }
}
