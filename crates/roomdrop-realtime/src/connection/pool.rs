//! Process-wide pool of live connections.

use std::sync::Arc;

use dashmap::DashMap;

use super::handle::{ConnectionHandle, ConnectionId};

/// All live connections of this service instance.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.connections.insert(handle.id, handle);
    }

    /// Remove a connection, returning its handle if it was present.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(id).map(|(_, handle)| handle)
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(id).map(|e| e.value().clone())
    }

    /// All connections of one peer, oldest first.
    pub fn peer_connections(&self, peer_id: &str) -> Vec<Arc<ConnectionHandle>> {
        let mut conns: Vec<Arc<ConnectionHandle>> = self
            .connections
            .iter()
            .filter(|e| e.value().peer_id == peer_id)
            .map(|e| e.value().clone())
            .collect();
        conns.sort_by_key(|c| c.connected_at);
        conns
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
