//! Client sync engine configuration.

use serde::{Deserialize, Serialize};

/// Offline reconciliation queue configuration (client side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum retry attempts for a transiently failing operation before it
    /// is parked as permanently failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubled per retry).
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Upper bound on the backoff delay in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Per-request timeout in seconds for drain operations.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_request_timeout() -> u64 {
    15
}
