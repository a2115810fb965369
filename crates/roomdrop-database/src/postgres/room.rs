//! PostgreSQL room store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use roomdrop_core::AppError;
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::RoomId;
use roomdrop_entity::room::{Room, RoomAccess, RoomCode, RoomLifespan, RoomMode, RoomSettings};

use crate::store::RoomStore;

use super::{db_err, is_unique_violation};

/// Raw database row for a room.
#[derive(Debug, FromRow)]
struct RoomRow {
    id: Uuid,
    code: String,
    mode: String,
    access: String,
    lifespan: String,
    owner: Option<String>,
    password_hash: Option<String>,
    settings: serde_json::Value,
    last_activity_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoomRow> for Room {
    type Error = AppError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        let mode = match row.mode.as_str() {
            "local" => RoomMode::Local,
            "internet" => RoomMode::Internet,
            other => return Err(AppError::database(format!("Unknown room mode '{other}'"))),
        };
        let access = match row.access.as_str() {
            "public" => RoomAccess::Public,
            "private" => RoomAccess::Private,
            "password" => RoomAccess::Password,
            other => return Err(AppError::database(format!("Unknown room access '{other}'"))),
        };
        let lifespan = match row.lifespan.as_str() {
            "temporary" => RoomLifespan::Temporary,
            "persistent" => RoomLifespan::Persistent,
            other => {
                return Err(AppError::database(format!(
                    "Unknown room lifespan '{other}'"
                )));
            }
        };
        let settings: RoomSettings = serde_json::from_value(row.settings)?;
        Ok(Room {
            id: RoomId::from_uuid(row.id),
            code: RoomCode::parse(&row.code)?,
            mode,
            access,
            lifespan,
            owner: row.owner,
            password_hash: row.password_hash,
            settings,
            last_activity_at: row.last_activity_at,
            deleted_at: row.deleted_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// Room store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    /// Create a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn create(&self, room: &Room) -> AppResult<Room> {
        let settings = serde_json::to_value(&room.settings)?;
        let row = sqlx::query_as::<_, RoomRow>(
            "INSERT INTO rooms (id, code, mode, access, lifespan, owner, password_hash, \
             settings, last_activity_at, deleted_at, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(room.id.into_uuid())
        .bind(room.code.as_str())
        .bind(room.mode.as_str())
        .bind(room.access.as_str())
        .bind(room.lifespan.as_str())
        .bind(&room.owner)
        .bind(&room.password_hash)
        .bind(settings)
        .bind(room.last_activity_at)
        .bind(room.deleted_at)
        .bind(room.expires_at)
        .bind(room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(format!("Room code {} is already taken", room.code))
            } else {
                db_err("Failed to create room", e)
            }
        })?;
        row.try_into()
    }

    async fn find_by_id(&self, id: RoomId) -> AppResult<Option<Room>> {
        sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find room", e))?
            .map(Room::try_from)
            .transpose()
    }

    async fn find_by_code(&self, code: &RoomCode) -> AppResult<Option<Room>> {
        sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE code = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to find room by code", e))?
            .map(Room::try_from)
            .transpose()
    }

    async fn touch_activity(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE rooms SET last_activity_at = $2 WHERE id = $1")
            .bind(id.into_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to touch room activity", e))?;
        Ok(())
    }

    async fn soft_delete(&self, id: RoomId, at: DateTime<Utc>) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE rooms SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.into_uuid())
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("Failed to soft-delete room", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<Vec<Room>> {
        let rows = sqlx::query_as::<_, RoomRow>(
            "UPDATE rooms SET deleted_at = $1 \
             WHERE deleted_at IS NULL AND expires_at IS NOT NULL AND expires_at <= $1 \
             RETURNING *",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to expire stale rooms", e))?;
        rows.into_iter().map(Room::try_from).collect()
    }
}
