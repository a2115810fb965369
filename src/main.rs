//! RoomDrop server — room synchronization & resumable transfer engine.
//!
//! Entry point that wires the store backends, chunk storage, services,
//! real-time engine, background reapers, and the HTTP/WebSocket surface.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use roomdrop_core::config::AppConfig;
use roomdrop_core::error::AppError;
use roomdrop_core::traits::storage::StorageProvider;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load layered configuration (`config/default.toml` + `config/{env}.toml`
/// + `ROOMDROP_`-prefixed environment variables).
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("ROOMDROP_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing with the configured level and format.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => fmt().json().with_env_filter(filter).with_target(true).init(),
        _ => fmt().pretty().with_env_filter(filter).with_target(true).init(),
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    info!("Starting RoomDrop v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Stores and chunk storage ─────────────────────────────────
    let stores = roomdrop_database::StoreManager::new(&config.database).await?;
    let storage: Arc<dyn StorageProvider> = Arc::new(
        roomdrop_storage::LocalStorageProvider::new(&config.storage.root_path).await?,
    );

    // ── Services, presence table, broadcast bus ──────────────────
    let state = roomdrop_api::AppState::new(config.clone(), stores.clone(), storage);

    // ── Background reapers ───────────────────────────────────────
    let scheduler = if config.worker.enabled {
        let mut executor = roomdrop_worker::JobExecutor::new();
        executor.register(Arc::new(
            roomdrop_worker::jobs::UploadReaperHandler::new(state.uploads.clone()),
        ));
        executor.register(Arc::new(roomdrop_worker::jobs::RoomReaperHandler::new(
            stores.rooms(),
            state.uploads.clone(),
        )));
        executor.register(Arc::new(
            roomdrop_worker::jobs::VersionRetentionHandler::new(
                stores.items(),
                stores.rooms(),
                state.items.versions().clone(),
                config.room.version_retention,
            ),
        ));

        let scheduler =
            roomdrop_worker::CronScheduler::new(Arc::new(executor), config.worker.clone()).await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        info!("Background worker disabled");
        None
    };

    // ── HTTP + WebSocket server ──────────────────────────────────
    let realtime = state.realtime.clone();
    let app = roomdrop_api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!("RoomDrop server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Graceful shutdown ────────────────────────────────────────
    info!("Shutdown signal received, stopping background tasks");
    realtime.shutdown()?;
    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }

    info!("RoomDrop server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
