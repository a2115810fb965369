//! Room defaults and limits.

use serde::{Deserialize, Serialize};

/// Default settings applied to newly created rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum number of items a room may hold.
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// Maximum file size in bytes (default 2 GB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Allowed MIME types for file items (empty = all types allowed).
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
    /// Number of versions retained per item.
    #[serde(default = "default_version_retention")]
    pub version_retention: u32,
    /// Hours after which a temporary room expires.
    #[serde(default = "default_temporary_ttl")]
    pub temporary_room_ttl_hours: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_file_size_bytes: default_max_file_size(),
            allowed_mime_types: Vec::new(),
            version_retention: default_version_retention(),
            temporary_room_ttl_hours: default_temporary_ttl(),
        }
    }
}

fn default_max_items() -> u32 {
    500
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_version_retention() -> u32 {
    10
}

fn default_temporary_ttl() -> u32 {
    24
}
