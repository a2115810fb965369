//! Room entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::RoomId;

use super::code::RoomCode;
use super::settings::RoomSettings;

/// Network scope of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    /// Discoverable only on the local network segment.
    Local,
    /// Reachable over the internet by code.
    Internet,
}

/// Access policy of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomAccess {
    /// Anyone with the code may join.
    Public,
    /// Only the owner may admit peers.
    Private,
    /// Joining requires the room password.
    Password,
}

/// Lifespan policy of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomLifespan {
    /// Expires automatically after the configured TTL.
    Temporary,
    /// Kept until explicitly deleted.
    Persistent,
}

impl RoomMode {
    /// Return the mode as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Internet => "internet",
        }
    }
}

impl RoomAccess {
    /// Return the access policy as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Password => "password",
        }
    }
}

impl RoomLifespan {
    /// Return the lifespan as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Persistent => "persistent",
        }
    }
}

/// A named, access-controlled space containing items and connected peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Unique room identifier.
    pub id: RoomId,
    /// Canonical 8-character join code.
    pub code: RoomCode,
    /// Network scope.
    pub mode: RoomMode,
    /// Access policy.
    pub access: RoomAccess,
    /// Lifespan policy.
    pub lifespan: RoomLifespan,
    /// External identity of the room owner, if any.
    pub owner: Option<String>,
    /// Argon2 hash of the room password (set iff access is `Password`).
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    /// Limits and policies.
    pub settings: RoomSettings,
    /// Last time any item or presence activity occurred.
    pub last_activity_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Hard expiry for temporary rooms.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// A room is accessible iff it is not soft-deleted and has not expired.
    pub fn is_accessible(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.expires_at.map_or(true, |e| e > now)
    }
}
