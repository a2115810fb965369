//! In-memory item store.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId};
use roomdrop_entity::item::Item;

use crate::store::ItemStore;

/// Dashmap-backed item store.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: DashMap<Uuid, Item>,
}

impl MemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert(&self, item: &Item) -> AppResult<Item> {
        match self.items.entry(item.id.into_uuid()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Item {} already exists",
                item.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(item.clone());
                Ok(item.clone())
            }
        }
    }

    async fn find_by_id(&self, id: ItemId) -> AppResult<Option<Item>> {
        Ok(self.items.get(id.as_uuid()).map(|i| i.clone()))
    }

    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|e| e.value().room_id == room_id)
            .map(|e| e.value().clone())
            .collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn count_by_room(&self, room_id: RoomId) -> AppResult<u64> {
        Ok(self
            .items
            .iter()
            .filter(|e| e.value().room_id == room_id)
            .count() as u64)
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        match self.items.get_mut(item.id.as_uuid()) {
            Some(mut existing) => {
                *existing = item.clone();
                Ok(item.clone())
            }
            None => Err(AppError::not_found(format!("Item {} not found", item.id))),
        }
    }

    async fn delete(&self, id: ItemId) -> AppResult<bool> {
        Ok(self.items.remove(id.as_uuid()).is_some())
    }

    async fn delete_by_room(&self, room_id: RoomId) -> AppResult<u64> {
        let ids: Vec<Uuid> = self
            .items
            .iter()
            .filter(|e| e.value().room_id == room_id)
            .map(|e| *e.key())
            .collect();
        let mut removed = 0;
        for id in ids {
            if self.items.remove(&id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
