//! In-memory chunk ledger store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId, UploadId};
use roomdrop_entity::upload::{Upload, UploadStatus};

use crate::store::UploadStore;

/// Dashmap-backed chunk ledger store.
///
/// All `mark_chunk` decisions happen while holding the ledger's entry
/// guard, which is this backend's equivalent of the conditional-update
/// statement in the PostgreSQL backend.
#[derive(Debug, Default)]
pub struct MemoryUploadStore {
    uploads: DashMap<Uuid, Upload>,
}

impl MemoryUploadStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn create(&self, upload: &Upload) -> AppResult<Upload> {
        match self.uploads.entry(upload.id.into_uuid()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Upload {} already exists",
                upload.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(upload.clone());
                Ok(upload.clone())
            }
        }
    }

    async fn find(&self, id: UploadId) -> AppResult<Option<Upload>> {
        Ok(self.uploads.get(id.as_uuid()).map(|u| u.clone()))
    }

    async fn mark_chunk(
        &self,
        id: UploadId,
        index: i32,
        etag: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Upload> {
        let Some(mut entry) = self.uploads.get_mut(id.as_uuid()) else {
            return Err(AppError::not_found(format!("Upload {id} not found")));
        };
        let upload = entry.value_mut();

        if index < 0 || index >= upload.total_chunks {
            return Err(AppError::validation(format!(
                "Chunk index {index} out of range (total: {})",
                upload.total_chunks
            )));
        }
        if upload.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Upload {id} is {} and accepts no further chunks",
                upload.status
            )));
        }
        if upload.expires_at <= now {
            return Err(AppError::expired(format!(
                "Upload {id} expired at {}",
                upload.expires_at
            )));
        }

        let slot = &mut upload.chunks[index as usize];
        if !slot.uploaded {
            slot.uploaded = true;
            slot.etag = etag;
        }
        if upload.status == UploadStatus::Pending {
            upload.status = UploadStatus::Uploading;
        }
        Ok(upload.clone())
    }

    async fn set_status(&self, id: UploadId, status: UploadStatus) -> AppResult<bool> {
        match self.uploads.get_mut(id.as_uuid()) {
            Some(mut entry) => {
                entry.value_mut().status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, id: UploadId, item_id: ItemId) -> AppResult<bool> {
        match self.uploads.get_mut(id.as_uuid()) {
            Some(mut entry) => {
                let upload = entry.value_mut();
                if upload.status.is_terminal() {
                    return Ok(false);
                }
                upload.status = UploadStatus::Completed;
                upload.item_id = Some(item_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Upload>> {
        Ok(self
            .uploads
            .iter()
            .filter(|e| e.value().status.is_reapable() && e.value().expires_at <= now)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Upload>> {
        Ok(self
            .uploads
            .iter()
            .filter(|e| e.value().room_id == room_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn delete(&self, id: UploadId) -> AppResult<bool> {
        Ok(self.uploads.remove(id.as_uuid()).is_some())
    }
}
