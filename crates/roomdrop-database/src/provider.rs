//! Store manager that dispatches to the configured backend.

use std::sync::Arc;

use tracing::info;

use roomdrop_core::config::database::DatabaseConfig;
use roomdrop_core::error::AppError;
use roomdrop_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::{MemoryItemStore, MemoryRoomStore, MemoryUploadStore, MemoryVersionStore};
use crate::migration;
use crate::postgres::{PgItemStore, PgRoomStore, PgUploadStore, PgVersionStore};
use crate::store::{ItemStore, RoomStore, UploadStore, VersionStore};

/// The set of stores backing the engine.
///
/// The backend is selected at construction time based on configuration;
/// everything downstream holds trait objects and is oblivious to the
/// choice.
#[derive(Debug, Clone)]
pub struct StoreManager {
    rooms: Arc<dyn RoomStore>,
    items: Arc<dyn ItemStore>,
    uploads: Arc<dyn UploadStore>,
    versions: Arc<dyn VersionStore>,
}

impl StoreManager {
    /// Create a store manager from configuration.
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend.as_str() {
            "postgres" => {
                info!("Initializing PostgreSQL store backend");
                let pool = DatabasePool::connect(config).await?;
                migration::run_migrations(pool.pool()).await?;
                let pool = pool.pool().clone();
                Ok(Self {
                    rooms: Arc::new(PgRoomStore::new(pool.clone())),
                    items: Arc::new(PgItemStore::new(pool.clone())),
                    uploads: Arc::new(PgUploadStore::new(pool.clone())),
                    versions: Arc::new(PgVersionStore::new(pool)),
                })
            }
            "memory" => {
                info!("Initializing in-memory store backend");
                Ok(Self::memory())
            }
            other => Err(AppError::configuration(format!(
                "Unknown store backend: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// Create an in-memory store set (tests and ephemeral deployments).
    pub fn memory() -> Self {
        Self {
            rooms: Arc::new(MemoryRoomStore::new()),
            items: Arc::new(MemoryItemStore::new()),
            uploads: Arc::new(MemoryUploadStore::new()),
            versions: Arc::new(MemoryVersionStore::new()),
        }
    }

    /// The room store.
    pub fn rooms(&self) -> Arc<dyn RoomStore> {
        self.rooms.clone()
    }

    /// The item store.
    pub fn items(&self) -> Arc<dyn ItemStore> {
        self.items.clone()
    }

    /// The chunk ledger store.
    pub fn uploads(&self) -> Arc<dyn UploadStore> {
        self.uploads.clone()
    }

    /// The version store.
    pub fn versions(&self) -> Arc<dyn VersionStore> {
        self.versions.clone()
    }
}
