//! In-memory room store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::RoomId;
use roomdrop_entity::room::{Room, RoomCode};

use crate::store::RoomStore;

/// Dashmap-backed room store with a code uniqueness index.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    /// Room id → room.
    rooms: DashMap<Uuid, Room>,
    /// Canonical code → room id (uniqueness index).
    codes: DashMap<String, Uuid>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create(&self, room: &Room) -> AppResult<Room> {
        // Reserve the code first; the entry guard makes the reservation
        // atomic with respect to concurrent creates.
        match self.codes.entry(room.code.as_str().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AppError::conflict(format!(
                    "Room code {} is already taken",
                    room.code
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(room.id.into_uuid());
            }
        }
        self.rooms.insert(room.id.into_uuid(), room.clone());
        Ok(room.clone())
    }

    async fn find_by_id(&self, id: RoomId) -> AppResult<Option<Room>> {
        Ok(self.rooms.get(id.as_uuid()).map(|r| r.clone()))
    }

    async fn find_by_code(&self, code: &RoomCode) -> AppResult<Option<Room>> {
        let Some(id) = self.codes.get(code.as_str()).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.rooms.get(&id).map(|r| r.clone()))
    }

    async fn touch_activity(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(mut room) = self.rooms.get_mut(id.as_uuid()) {
            room.last_activity_at = at;
        }
        Ok(())
    }

    async fn soft_delete(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<bool> {
        match self.rooms.get_mut(id.as_uuid()) {
            Some(mut room) if room.deleted_at.is_none() => {
                room.deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<Room>> {
        let mut expired = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            let room = entry.value_mut();
            if room.deleted_at.is_none() && room.expires_at.is_some_and(|e| e <= now) {
                room.deleted_at = Some(now);
                expired.push(room.clone());
            }
        }
        Ok(expired)
    }
}
