//! Application state shared across all handlers.

use std::sync::Arc;

use roomdrop_core::config::AppConfig;
use roomdrop_core::traits::storage::StorageProvider;
use roomdrop_database::StoreManager;
use roomdrop_realtime::RealtimeEngine;
use roomdrop_service::item::service::ItemService;
use roomdrop_service::item::versions::VersionService;
use roomdrop_service::room::service::RoomService;
use roomdrop_service::upload::UploadService;

/// Shared dependencies, passed to every handler via `State<AppState>`.
///
/// Everything is `Arc`-backed, so cloning per request is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Store backends.
    pub stores: StoreManager,
    /// Chunk byte storage.
    pub storage: Arc<dyn StorageProvider>,
    /// Presence table and broadcast bus.
    pub realtime: Arc<RealtimeEngine>,
    /// Room lifecycle and access policy.
    pub rooms: RoomService,
    /// Item mutation with version history.
    pub items: ItemService,
    /// Chunk ledger flows.
    pub uploads: UploadService,
}

impl AppState {
    /// Wire the full service graph over the given backends.
    pub fn new(
        config: Arc<AppConfig>,
        stores: StoreManager,
        storage: Arc<dyn StorageProvider>,
    ) -> Self {
        let realtime = Arc::new(RealtimeEngine::new(config.realtime.clone()));
        let versions = VersionService::new(stores.versions());
        let items = ItemService::new(stores.items(), versions);
        let rooms = RoomService::new(stores.rooms(), config.room.clone());
        let uploads = UploadService::new(
            stores.uploads(),
            stores.rooms(),
            items.clone(),
            storage.clone(),
            config.storage.clone(),
        );

        Self {
            config,
            stores,
            storage,
            realtime,
            rooms,
            items,
            uploads,
        }
    }
}
