//! PostgreSQL version store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId, VersionId};
use roomdrop_entity::item::ItemPayload;
use roomdrop_entity::version::Version;

use crate::store::VersionStore;

use super::db_err;

/// Raw database row for a version snapshot.
#[derive(Debug, FromRow)]
struct VersionRow {
    id: Uuid,
    item_id: Uuid,
    room_id: Uuid,
    version: i64,
    payload: serde_json::Value,
    author: Option<String>,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<VersionRow> for Version {
    type Error = AppError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        let payload: ItemPayload = serde_json::from_value(row.payload)?;
        Ok(Version {
            id: VersionId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            room_id: RoomId::from_uuid(row.room_id),
            version: row.version,
            payload,
            author: row.author,
            size_bytes: row.size_bytes,
            created_at: row.created_at,
        })
    }
}

/// Version store backed by PostgreSQL.
///
/// The `(item_id, version)` uniqueness constraint is the arbiter for
/// concurrent appends; `ON CONFLICT DO NOTHING` turns the losing insert
/// into an observable `Conflict`.
#[derive(Debug, Clone)]
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    /// Create a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn append(&self, version: &Version) -> AppResult<Version> {
        let payload = serde_json::to_value(&version.payload)?;
        let row = sqlx::query_as::<_, VersionRow>(
            "INSERT INTO item_versions (id, item_id, room_id, version, payload, author, \
             size_bytes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_item_versions_item_version DO NOTHING \
             RETURNING *",
        )
        .bind(version.id.into_uuid())
        .bind(version.item_id.into_uuid())
        .bind(version.room_id.into_uuid())
        .bind(version.version)
        .bind(payload)
        .bind(&version.author)
        .bind(version.size_bytes)
        .bind(version.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to append version", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(AppError::conflict(format!(
                "Version {} of item {} already exists",
                version.version, version.item_id
            ))),
        }
    }

    async fn max_version(&self, item_id: ItemId) -> AppResult<i64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM item_versions WHERE item_id = $1")
                .bind(item_id.into_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_err("Failed to read max version", e))?;
        Ok(max.unwrap_or(0))
    }

    async fn latest(&self, item_id: ItemId) -> AppResult<Option<Version>> {
        sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM item_versions WHERE item_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(item_id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to read latest version", e))?
        .map(Version::try_from)
        .transpose()
    }

    async fn history(&self, item_id: ItemId, limit: u32) -> AppResult<Vec<Version>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM item_versions WHERE item_id = $1 ORDER BY version DESC LIMIT $2",
        )
        .bind(item_id.into_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to read version history", e))?;
        rows.into_iter().map(Version::try_from).collect()
    }

    async fn prune(&self, item_id: ItemId, keep: u32) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM item_versions WHERE item_id = $1 AND id IN ( \
                 SELECT id FROM ( \
                     SELECT id, ROW_NUMBER() OVER (ORDER BY version DESC) AS rn \
                     FROM item_versions WHERE item_id = $1 \
                 ) ranked WHERE rn > $2)",
        )
        .bind(item_id.into_uuid())
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to prune versions", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_by_item(&self, item_id: ItemId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM item_versions WHERE item_id = $1")
            .bind(item_id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete item versions", e))?;
        Ok(result.rows_affected())
    }

    async fn item_ids_with_history(&self) -> AppResult<Vec<ItemId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT DISTINCT item_id FROM item_versions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list items with history", e))?;
        Ok(ids.into_iter().map(ItemId::from_uuid).collect())
    }
}
