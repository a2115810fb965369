//! Version append, history, and retention.

use std::sync::Arc;

use tracing::debug;

use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId};
use roomdrop_database::store::VersionStore;
use roomdrop_entity::item::ItemPayload;
use roomdrop_entity::version::Version;

/// Bounded retries for the append race: of two concurrent writers exactly
/// one claims a number, the other re-reads the max and tries the next one.
const APPEND_RETRIES: usize = 3;

/// Append-only per-item revision log with bounded retention.
#[derive(Clone)]
pub struct VersionService {
    versions: Arc<dyn VersionStore>,
}

impl std::fmt::Debug for VersionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionService").finish()
    }
}

impl VersionService {
    /// Creates a new version service.
    pub fn new(versions: Arc<dyn VersionStore>) -> Self {
        Self { versions }
    }

    /// Appends the next version for an item.
    ///
    /// Reads the current maximum (0 if none) and writes at `max + 1`. A
    /// `Conflict` from the uniqueness constraint means a concurrent writer
    /// claimed the number first; the read-append cycle retries at most
    /// [`APPEND_RETRIES`] times before surfacing the conflict.
    pub async fn append_next(
        &self,
        item_id: ItemId,
        room_id: RoomId,
        payload: ItemPayload,
        author: Option<String>,
    ) -> AppResult<Version> {
        let mut last_err = None;
        for attempt in 0..=APPEND_RETRIES {
            let next = self.versions.max_version(item_id).await? + 1;
            let candidate = Version::snapshot(item_id, room_id, next, payload.clone(), author.clone());
            match self.versions.append(&candidate).await {
                Ok(version) => {
                    debug!(item = %item_id, version = version.version, attempt, "Version appended");
                    return Ok(version);
                }
                Err(e) if e.kind == ErrorKind::Conflict => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::internal("Version append retries exhausted")))
    }

    /// The highest-numbered version of an item, if any.
    pub async fn latest(&self, item_id: ItemId) -> AppResult<Option<Version>> {
        self.versions.latest(item_id).await
    }

    /// The most recent `limit` versions, newest first.
    pub async fn history(&self, item_id: ItemId, limit: u32) -> AppResult<Vec<Version>> {
        self.versions.history(item_id, limit).await
    }

    /// Deletes all but the `keep` newest versions of an item and reports
    /// the count removed. Survivors keep their numbers.
    pub async fn prune(&self, item_id: ItemId, keep: u32) -> AppResult<u64> {
        let removed = self.versions.prune(item_id, keep).await?;
        if removed > 0 {
            debug!(item = %item_id, removed, keep, "Pruned version history");
        }
        Ok(removed)
    }

    /// Drops an item's entire history (item deletion).
    pub async fn delete_history(&self, item_id: ItemId) -> AppResult<u64> {
        self.versions.delete_by_item(item_id).await
    }

    /// Items that currently have any history (retention sweep).
    pub async fn items_with_history(&self) -> AppResult<Vec<ItemId>> {
        self.versions.item_ids_with_history().await
    }
}
