//! PostgreSQL chunk ledger store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::{ItemId, RoomId, UploadId};
use roomdrop_entity::upload::{ChunkRecord, Upload, UploadStatus};

use crate::store::UploadStore;

use super::db_err;

/// Raw database row for an upload ledger.
#[derive(Debug, FromRow)]
struct UploadRow {
    id: Uuid,
    room_id: Uuid,
    uploaded_by: Option<String>,
    filename: String,
    mime_type: String,
    total_size: i64,
    storage_key: String,
    external_transfer_id: Option<String>,
    encrypted: bool,
    iv: Option<String>,
    chunks: serde_json::Value,
    total_chunks: i32,
    status: String,
    item_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UploadRow> for Upload {
    type Error = AppError;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        let chunks: Vec<ChunkRecord> = serde_json::from_value(row.chunks)?;
        let status: UploadStatus = row.status.parse()?;
        Ok(Upload {
            id: UploadId::from_uuid(row.id),
            room_id: RoomId::from_uuid(row.room_id),
            uploaded_by: row.uploaded_by,
            filename: row.filename,
            mime_type: row.mime_type,
            total_size: row.total_size,
            storage_key: row.storage_key,
            external_transfer_id: row.external_transfer_id,
            encrypted: row.encrypted,
            iv: row.iv,
            chunks,
            total_chunks: row.total_chunks,
            status,
            item_id: row.item_id.map(ItemId::from_uuid),
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// Chunk ledger store backed by PostgreSQL.
///
/// `mark_chunk` is a single conditional `UPDATE`: the status gate, the
/// expiry gate, the index bound, and the ack itself all evaluate inside
/// one statement, so concurrent acks from independent connections (or
/// replicas) cannot interleave badly.
#[derive(Debug, Clone)]
pub struct PgUploadStore {
    pool: PgPool,
}

impl PgUploadStore {
    /// Create a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Classify why a conditional `mark_chunk` update matched no row.
    async fn classify_rejected_ack(
        &self,
        id: UploadId,
        index: i32,
        now: DateTime<Utc>,
    ) -> AppError {
        let row = match sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => row,
            Ok(None) => return AppError::not_found(format!("Upload {id} not found")),
            Err(e) => return db_err("Failed to classify rejected chunk ack", e),
        };

        if index < 0 || index >= row.total_chunks {
            return AppError::validation(format!(
                "Chunk index {index} out of range (total: {})",
                row.total_chunks
            ));
        }
        match row.status.parse::<UploadStatus>() {
            Ok(status) if status.is_terminal() => AppError::conflict(format!(
                "Upload {id} is {status} and accepts no further chunks"
            )),
            _ if row.expires_at <= now => {
                AppError::expired(format!("Upload {id} expired at {}", row.expires_at))
            }
            _ => AppError::internal(format!("Chunk ack for upload {id} rejected unexpectedly")),
        }
    }
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn create(&self, upload: &Upload) -> AppResult<Upload> {
        let chunks = serde_json::to_value(&upload.chunks)?;
        let row = sqlx::query_as::<_, UploadRow>(
            "INSERT INTO uploads (id, room_id, uploaded_by, filename, mime_type, total_size, \
             storage_key, external_transfer_id, encrypted, iv, chunks, total_chunks, status, \
             item_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING *",
        )
        .bind(upload.id.into_uuid())
        .bind(upload.room_id.into_uuid())
        .bind(&upload.uploaded_by)
        .bind(&upload.filename)
        .bind(&upload.mime_type)
        .bind(upload.total_size)
        .bind(&upload.storage_key)
        .bind(&upload.external_transfer_id)
        .bind(upload.encrypted)
        .bind(&upload.iv)
        .bind(chunks)
        .bind(upload.total_chunks)
        .bind(upload.status.as_str())
        .bind(upload.item_id.map(|i| i.into_uuid()))
        .bind(upload.expires_at)
        .bind(upload.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create upload", e))?;
        row.try_into()
    }

    async fn find(&self, id: UploadId) -> AppResult<Option<Upload>> {
        sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find upload", e))?
            .map(Upload::try_from)
            .transpose()
    }

    async fn mark_chunk(
        &self,
        id: UploadId,
        index: i32,
        etag: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Upload> {
        let slot = serde_json::to_value(ChunkRecord {
            index,
            etag,
            uploaded: true,
        })?;

        let row = sqlx::query_as::<_, UploadRow>(
            "UPDATE uploads SET \
                 chunks = CASE \
                     WHEN (chunks -> $2 ->> 'uploaded')::boolean THEN chunks \
                     ELSE jsonb_set(chunks, ARRAY[$2::text], $3::jsonb) \
                 END, \
                 status = CASE WHEN status = 'pending' THEN 'uploading' ELSE status END \
             WHERE id = $1 \
               AND status IN ('pending', 'uploading') \
               AND expires_at > $4 \
               AND $2 >= 0 AND $2 < total_chunks \
             RETURNING *",
        )
        .bind(id.into_uuid())
        .bind(index)
        .bind(slot)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to acknowledge chunk", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(self.classify_rejected_ack(id, index, now).await),
        }
    }

    async fn set_status(&self, id: UploadId, status: UploadStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE uploads SET status = $2 WHERE id = $1")
            .bind(id.into_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to set upload status", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, id: UploadId, item_id: ItemId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE uploads SET status = 'completed', item_id = $2 \
             WHERE id = $1 AND status IN ('pending', 'uploading')",
        )
        .bind(id.into_uuid())
        .bind(item_id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to complete upload", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Upload>> {
        let rows = sqlx::query_as::<_, UploadRow>(
            "SELECT * FROM uploads \
             WHERE status IN ('pending', 'uploading') AND expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to find expired uploads", e))?;
        rows.into_iter().map(Upload::try_from).collect()
    }

    async fn list_by_room(&self, room_id: RoomId) -> AppResult<Vec<Upload>> {
        let rows = sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE room_id = $1")
            .bind(room_id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("Failed to list room uploads", e))?;
        rows.into_iter().map(Upload::try_from).collect()
    }

    async fn delete(&self, id: UploadId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM uploads WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete upload", e))?;
        Ok(result.rows_affected() > 0)
    }
}
