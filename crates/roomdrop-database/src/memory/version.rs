//! In-memory version store.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::ItemId;
use roomdrop_entity::version::Version;

use crate::store::VersionStore;

/// Dashmap-backed version store.
///
/// The uniqueness constraint on `(item_id, version)` is modeled with a
/// composite-key map whose entry guard is the atomic claim: of two
/// concurrent appends to the same number, exactly one wins the vacant
/// entry and the other observes `Conflict`.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    /// (item id, version number) → snapshot.
    versions: DashMap<(Uuid, i64), Version>,
}

impl MemoryVersionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn versions_of(&self, item_id: ItemId) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .versions
            .iter()
            .filter(|e| e.key().0 == item_id.into_uuid())
            .map(|e| e.value().clone())
            .collect();
        versions.sort_by_key(|v| std::cmp::Reverse(v.version));
        versions
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn append(&self, version: &Version) -> AppResult<Version> {
        let key = (version.item_id.into_uuid(), version.version);
        match self.versions.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Version {} of item {} already exists",
                version.version, version.item_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(version.clone());
                Ok(version.clone())
            }
        }
    }

    async fn max_version(&self, item_id: ItemId) -> AppResult<i64> {
        Ok(self
            .versions
            .iter()
            .filter(|e| e.key().0 == item_id.into_uuid())
            .map(|e| e.key().1)
            .max()
            .unwrap_or(0))
    }

    async fn latest(&self, item_id: ItemId) -> AppResult<Option<Version>> {
        Ok(self.versions_of(item_id).into_iter().next())
    }

    async fn history(&self, item_id: ItemId, limit: u32) -> AppResult<Vec<Version>> {
        Ok(self
            .versions_of(item_id)
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn prune(&self, item_id: ItemId, keep: u32) -> AppResult<u64> {
        let doomed: Vec<(Uuid, i64)> = self
            .versions_of(item_id)
            .into_iter()
            .skip(keep as usize)
            .map(|v| (v.item_id.into_uuid(), v.version))
            .collect();
        let mut removed = 0;
        for key in doomed {
            if self.versions.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_by_item(&self, item_id: ItemId) -> AppResult<u64> {
        let doomed: Vec<(Uuid, i64)> = self
            .versions
            .iter()
            .filter(|e| e.key().0 == item_id.into_uuid())
            .map(|e| *e.key())
            .collect();
        let mut removed = 0;
        for key in doomed {
            if self.versions.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn item_ids_with_history(&self) -> AppResult<Vec<ItemId>> {
        let ids: HashSet<Uuid> = self.versions.iter().map(|e| e.key().0).collect();
        Ok(ids.into_iter().map(ItemId::from_uuid).collect())
    }
}
