//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::info;

use roomdrop_core::config::realtime::RealtimeConfig;
use roomdrop_core::error::AppError;

use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::connection::pool::ConnectionPool;
use crate::message::types::ServerEvent;
use crate::room_table::RoomTable;

/// Central real-time engine coordinating connections, presence, and
/// fan-out.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Connection pool.
    pub pool: Arc<ConnectionPool>,
    /// Room subscriber/presence table.
    pub rooms: Arc<RoomTable>,
    /// Configuration.
    config: RealtimeConfig,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine").finish()
    }
}

impl RealtimeEngine {
    /// Create a new real-time engine.
    pub fn new(config: RealtimeConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        info!("Real-time engine initialized");
        Self {
            pool: Arc::new(ConnectionPool::new()),
            rooms: Arc::new(RoomTable::new()),
            config,
            shutdown_tx,
        }
    }

    /// Register a new connection for an authenticated peer.
    ///
    /// Enforces the per-peer connection cap by evicting the oldest
    /// connection. Returns the handle and the receiver feeding the socket's
    /// outbound half.
    pub fn register(
        &self,
        peer_id: String,
        display_name: Option<String>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(peer_id, display_name, tx));

        let existing = self.pool.peer_connections(&handle.peer_id);
        if existing.len() >= self.config.max_connections_per_peer {
            if let Some(oldest) = existing.first() {
                tracing::warn!(
                    peer = %handle.peer_id,
                    evicted = %oldest.id,
                    "Peer at connection cap, evicting oldest connection"
                );
                self.unregister(&oldest.id);
            }
        }

        self.pool.add(handle.clone());
        info!(conn_id = %handle.id, peer = %handle.peer_id, "Connection registered");
        (handle, rx)
    }

    /// Unregister a connection: drop it from the pool and from every room
    /// it subscribed to, firing `room:peer-left` where appropriate.
    pub fn unregister(&self, conn_id: &ConnectionId) {
        if let Some(handle) = self.pool.remove(conn_id) {
            handle.mark_dead();
            self.rooms.unsubscribe_all(*conn_id);
            info!(conn_id = %conn_id, peer = %handle.peer_id, "Connection unregistered");
        }
    }

    /// Configured server → client ping interval.
    pub fn ping_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.ping_interval_seconds)
    }

    /// Returns a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiates a graceful shutdown of the real-time engine.
    pub fn shutdown(&self) -> Result<(), AppError> {
        info!("Shutting down real-time engine");
        let _ = self.shutdown_tx.send(());
        Ok(())
    }
}
