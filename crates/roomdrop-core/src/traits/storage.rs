//! Storage provider trait for pluggable chunk byte storage backends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageObjectMeta {
    /// Path within the storage provider.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Trait for chunk byte storage backends.
///
/// The engine never interprets stored bytes; it writes chunk bodies under an
/// upload's storage key, reads them back for assembly checks, and deletes
/// them when an upload is reaped or cancelled. The local filesystem
/// implementation lives in `roomdrop-storage`; an S3-compatible provider
/// would implement the same trait.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Write bytes to the given path, creating parent directories as needed.
    /// Returns the entity tag (content hash) of the written object.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<String>;

    /// Read a stored object into memory.
    async fn read_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// Delete a single object. Missing objects are not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Delete a directory (prefix) and all its contents recursively.
    async fn delete_prefix(&self, path: &str) -> AppResult<()>;

    /// Check whether an object exists at the given path.
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Get metadata about a stored object.
    async fn metadata(&self, path: &str) -> AppResult<StorageObjectMeta>;
}
