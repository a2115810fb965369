//! Per-request actor context.

/// The already-authenticated actor identity attached to a request.
///
/// Authentication itself is external; the engine only carries the identity
/// through for ownership checks, presence, and version attribution.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer identity, if the transport supplied one.
    pub peer_id: Option<String>,
    /// Display name, if the peer provided one.
    pub display_name: Option<String>,
}

impl RequestContext {
    /// Context for a known peer.
    pub fn for_peer(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: Some(peer_id.into()),
            display_name: None,
        }
    }
}
