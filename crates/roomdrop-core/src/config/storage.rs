//! Chunk byte storage configuration.

use serde::{Deserialize, Serialize};

/// Storage configuration for upload chunk bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all stored chunk and file data.
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Chunk size in bytes for chunked uploads (default 5 MB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Hours before an unfinished upload expires and is reaped.
    #[serde(default = "default_upload_ttl")]
    pub upload_ttl_hours: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            chunk_size_bytes: default_chunk_size(),
            upload_ttl_hours: default_upload_ttl(),
        }
    }
}

fn default_root_path() -> String {
    "data/storage".to_string()
}

fn default_chunk_size() -> u64 {
    5 * 1024 * 1024
}

fn default_upload_ttl() -> u32 {
    24
}
