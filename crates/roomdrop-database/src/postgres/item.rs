//! PostgreSQL item store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId};
use roomdrop_entity::item::{Item, ItemPayload};

use crate::store::ItemStore;

use super::db_err;

/// Raw database row for an item.
#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    room_id: Uuid,
    payload: serde_json::Value,
    parent_id: Option<Uuid>,
    created_by: Option<String>,
    current_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let payload: ItemPayload = serde_json::from_value(row.payload)?;
        Ok(Item {
            id: ItemId::from_uuid(row.id),
            room_id: RoomId::from_uuid(row.room_id),
            payload,
            parent_id: row.parent_id.map(ItemId::from_uuid),
            created_by: row.created_by,
            current_version: row.current_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Item store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    /// Create a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: &Item) -> AppResult<Item> {
        let payload = serde_json::to_value(&item.payload)?;
        let row = sqlx::query_as::<_, ItemRow>(
            "INSERT INTO items (id, room_id, payload, parent_id, created_by, \
             current_version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING RETURNING *",
        )
        .bind(item.id.into_uuid())
        .bind(item.room_id.into_uuid())
        .bind(payload)
        .bind(item.parent_id.map(|p| p.into_uuid()))
        .bind(&item.created_by)
        .bind(item.current_version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to insert item", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(AppError::conflict(format!(
                "Item {} already exists",
                item.id
            ))),
        }
    }

    async fn find_by_id(&self, id: ItemId) -> AppResult<Option<Item>> {
        sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find item", e))?
            .map(Item::try_from)
            .transpose()
    }

    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT * FROM items WHERE room_id = $1 ORDER BY created_at ASC",
        )
        .bind(room_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list items", e))?;
        rows.into_iter().map(Item::try_from).collect()
    }

    async fn count_by_room(&self, room_id: RoomId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE room_id = $1")
            .bind(room_id.into_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("Failed to count items", e))?;
        Ok(count as u64)
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        let payload = serde_json::to_value(&item.payload)?;
        sqlx::query_as::<_, ItemRow>(
            "UPDATE items SET payload = $2, parent_id = $3, current_version = $4, \
             updated_at = $5 WHERE id = $1 RETURNING *",
        )
        .bind(item.id.into_uuid())
        .bind(payload)
        .bind(item.parent_id.map(|p| p.into_uuid()))
        .bind(item.current_version)
        .bind(item.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update item", e))?
        .ok_or_else(|| AppError::not_found(format!("Item {} not found", item.id)))?
        .try_into()
    }

    async fn delete(&self, id: ItemId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete item", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_room(&self, room_id: RoomId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM items WHERE room_id = $1")
            .bind(room_id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete room items", e))?;
        Ok(result.rows_affected())
    }
}
