//! Room service — creation, resolution, access policy, expiry.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{Duration, Utc};
use tracing::info;

use roomdrop_core::config::room::RoomConfig;
use roomdrop_core::error::{AppError, ErrorKind};
use roomdrop_core::result::AppResult;
use roomdrop_core::types::id::RoomId;
use roomdrop_database::store::RoomStore;
use roomdrop_entity::room::{Room, RoomAccess, RoomCode, RoomLifespan, RoomMode, RoomSettings};

use crate::context::RequestContext;

/// How many fresh codes to try when a generated code collides.
const CODE_RETRIES: usize = 5;

/// Parameters for creating a room.
#[derive(Debug, Clone)]
pub struct CreateRoomParams {
    /// Network scope.
    pub mode: RoomMode,
    /// Access policy.
    pub access: RoomAccess,
    /// Lifespan policy.
    pub lifespan: RoomLifespan,
    /// Plaintext room password; required iff access is `Password`.
    pub password: Option<String>,
    /// Settings overrides (server defaults apply when `None`).
    pub settings: Option<RoomSettings>,
}

/// Handles room lifecycle and access policy.
#[derive(Clone)]
pub struct RoomService {
    rooms: Arc<dyn RoomStore>,
    config: RoomConfig,
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService").finish()
    }
}

impl RoomService {
    /// Creates a new room service.
    pub fn new(rooms: Arc<dyn RoomStore>, config: RoomConfig) -> Self {
        Self { rooms, config }
    }

    /// Creates a room, generating a unique code.
    pub async fn create_room(
        &self,
        ctx: &RequestContext,
        params: CreateRoomParams,
    ) -> AppResult<Room> {
        let password_hash = match (&params.access, &params.password) {
            (RoomAccess::Password, Some(password)) => Some(hash_password(password)?),
            (RoomAccess::Password, None) => {
                return Err(AppError::validation(
                    "A password room requires a password",
                ));
            }
            _ => None,
        };

        let settings = params
            .settings
            .unwrap_or_else(|| RoomSettings::from_config(&self.config));

        let now = Utc::now();
        let expires_at = match params.lifespan {
            RoomLifespan::Temporary => {
                let hours = settings
                    .auto_expire_hours
                    .unwrap_or(self.config.temporary_room_ttl_hours);
                Some(now + Duration::hours(hours as i64))
            }
            RoomLifespan::Persistent => None,
        };

        let mut last_err = None;
        for _ in 0..CODE_RETRIES {
            let room = Room {
                id: RoomId::new(),
                code: RoomCode::generate(),
                mode: params.mode,
                access: params.access,
                lifespan: params.lifespan,
                owner: ctx.peer_id.clone(),
                password_hash: password_hash.clone(),
                settings: settings.clone(),
                last_activity_at: now,
                deleted_at: None,
                expires_at,
                created_at: now,
            };
            match self.rooms.create(&room).await {
                Ok(created) => {
                    info!(
                        room = %created.code,
                        mode = created.mode.as_str(),
                        lifespan = created.lifespan.as_str(),
                        "Room created"
                    );
                    return Ok(created);
                }
                Err(e) if e.kind == ErrorKind::Conflict => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::internal("Room code generation exhausted")))
    }

    /// Resolves a code to an accessible room.
    ///
    /// Expired rooms surface as `Expired`, soft-deleted and unknown codes as
    /// `NotFound`.
    pub async fn resolve(&self, code: &RoomCode) -> AppResult<Room> {
        let room = self
            .rooms
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Room {code} not found")))?;

        if room.deleted_at.is_some() {
            return Err(AppError::not_found(format!("Room {code} not found")));
        }
        let now = Utc::now();
        if !room.is_accessible(now) {
            return Err(AppError::expired(format!("Room {code} has expired")));
        }
        Ok(room)
    }

    /// Verifies the presented password against a password room.
    ///
    /// Rooms with other access policies accept any presented password.
    pub fn verify_password(&self, room: &Room, password: Option<&str>) -> AppResult<()> {
        if room.access != RoomAccess::Password {
            return Ok(());
        }
        let Some(hash) = &room.password_hash else {
            return Err(AppError::internal(format!(
                "Password room {} has no password hash",
                room.code
            )));
        };
        let Some(password) = password else {
            return Err(AppError::forbidden("This room requires a password"));
        };
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("Stored password hash is invalid: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::forbidden("Incorrect room password"))
    }

    /// Records room activity.
    pub async fn touch(&self, room_id: RoomId) -> AppResult<()> {
        self.rooms.touch_activity(room_id, Utc::now()).await
    }

    /// Soft-deletes a room; only the owner may do so.
    pub async fn delete_room(&self, ctx: &RequestContext, room: &Room) -> AppResult<()> {
        if room.owner.is_some() && room.owner != ctx.peer_id {
            return Err(AppError::forbidden(
                "Only the room owner may delete the room",
            ));
        }
        if self.rooms.soft_delete(room.id, Utc::now()).await? {
            info!(room = %room.code, "Room soft-deleted");
        }
        Ok(())
    }
}

/// Hash a room password with argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}
