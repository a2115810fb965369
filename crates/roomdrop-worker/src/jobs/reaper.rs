//! Reaper job handlers: expired uploads, expired rooms, version retention.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use roomdrop_database::store::{ItemStore, RoomStore};
use roomdrop_service::item::versions::VersionService;
use roomdrop_service::upload::UploadService;

use crate::executor::{JobExecutionError, JobHandler};

/// Destroys unfinished uploads whose hard expiry has passed.
#[derive(Debug)]
pub struct UploadReaperHandler {
    uploads: UploadService,
}

impl UploadReaperHandler {
    /// Create a new upload reaper.
    pub fn new(uploads: UploadService) -> Self {
        Self { uploads }
    }
}

#[async_trait]
impl JobHandler for UploadReaperHandler {
    fn job_type(&self) -> &str {
        "upload_reaper"
    }

    async fn execute(&self) -> Result<Option<Value>, JobExecutionError> {
        let removed = self
            .uploads
            .expire_stale(Utc::now())
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Upload reap failed: {e}")))?;

        Ok(Some(serde_json::json!({
            "task": "upload_reaper",
            "expired_uploads_removed": removed,
        })))
    }
}

/// Soft-deletes rooms past their hard expiry and destroys their uploads.
#[derive(Debug)]
pub struct RoomReaperHandler {
    rooms: Arc<dyn RoomStore>,
    uploads: UploadService,
}

impl RoomReaperHandler {
    /// Create a new room reaper.
    pub fn new(rooms: Arc<dyn RoomStore>, uploads: UploadService) -> Self {
        Self { rooms, uploads }
    }
}

#[async_trait]
impl JobHandler for RoomReaperHandler {
    fn job_type(&self) -> &str {
        "room_reaper"
    }

    async fn execute(&self) -> Result<Option<Value>, JobExecutionError> {
        let expired = self
            .rooms
            .expire_stale(Utc::now())
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Room reap failed: {e}")))?;

        let mut uploads_removed = 0u64;
        for room in &expired {
            match self.uploads.destroy_room_uploads(room).await {
                Ok(n) => uploads_removed += n,
                Err(e) => warn!(room = %room.code, error = %e, "Upload cleanup for expired room failed"),
            }
            info!(room = %room.code, "Expired room reaped");
        }

        Ok(Some(serde_json::json!({
            "task": "room_reaper",
            "expired_rooms": expired.len(),
            "uploads_removed": uploads_removed,
        })))
    }
}

/// Prunes version history beyond each room's retention count.
///
/// Backstop for the pruning done on the item-update hot path: it catches
/// items mutated by other replicas and retention settings lowered after
/// the fact.
#[derive(Debug)]
pub struct VersionRetentionHandler {
    items: Arc<dyn ItemStore>,
    rooms: Arc<dyn RoomStore>,
    versions: VersionService,
    default_keep: u32,
}

impl VersionRetentionHandler {
    /// Create a new retention sweep handler.
    pub fn new(
        items: Arc<dyn ItemStore>,
        rooms: Arc<dyn RoomStore>,
        versions: VersionService,
        default_keep: u32,
    ) -> Self {
        Self {
            items,
            rooms,
            versions,
            default_keep,
        }
    }
}

#[async_trait]
impl JobHandler for VersionRetentionHandler {
    fn job_type(&self) -> &str {
        "version_retention"
    }

    async fn execute(&self) -> Result<Option<Value>, JobExecutionError> {
        let item_ids = self
            .versions
            .items_with_history()
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Retention sweep failed: {e}")))?;

        let mut pruned = 0u64;
        let mut orphaned = 0u64;
        for item_id in item_ids {
            let Some(item) = self
                .items
                .find_by_id(item_id)
                .await
                .map_err(|e| JobExecutionError::Transient(e.to_string()))?
            else {
                // History outliving its item has no retention policy left.
                orphaned += self
                    .versions
                    .delete_history(item_id)
                    .await
                    .map_err(|e| JobExecutionError::Transient(e.to_string()))?;
                continue;
            };

            let keep = match self
                .rooms
                .find_by_id(item.room_id)
                .await
                .map_err(|e| JobExecutionError::Transient(e.to_string()))?
            {
                Some(room) => room.settings.version_retention,
                None => self.default_keep,
            };
            pruned += self
                .versions
                .prune(item_id, keep)
                .await
                .map_err(|e| JobExecutionError::Transient(e.to_string()))?;
        }

        Ok(Some(serde_json::json!({
            "task": "version_retention",
            "versions_pruned": pruned,
            "orphaned_versions_removed": orphaned,
        })))
    }
}
