//! Per-room limits and policies.

use serde::{Deserialize, Serialize};

use roomdrop_core::config::room::RoomConfig;

/// Settings attached to a room at creation time.
///
/// Defaults come from the server's [`RoomConfig`]; individual rooms may
/// override any field when created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Maximum number of items the room may hold.
    pub max_items: u32,
    /// Maximum file size in bytes for uploads into this room.
    pub max_file_size_bytes: u64,
    /// Allowed MIME types for file items (empty = all types allowed).
    pub allowed_mime_types: Vec<String>,
    /// Number of versions retained per item.
    pub version_retention: u32,
    /// Hours of inactivity after which a temporary room expires.
    pub auto_expire_hours: Option<u32>,
}

impl RoomSettings {
    /// Build settings from server defaults.
    pub fn from_config(config: &RoomConfig) -> Self {
        Self {
            max_items: config.max_items,
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_mime_types: config.allowed_mime_types.clone(),
            version_retention: config.version_retention,
            auto_expire_hours: Some(config.temporary_room_ttl_hours),
        }
    }

    /// Whether the given MIME type may be uploaded into this room.
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        if self.allowed_mime_types.is_empty() {
            return true;
        }
        self.allowed_mime_types.iter().any(|allowed| {
            if let Some(prefix) = allowed.strip_suffix("/*") {
                mime_type.starts_with(prefix) && mime_type.as_bytes().get(prefix.len()) == Some(&b'/')
            } else {
                allowed == mime_type
            }
        })
    }
}
