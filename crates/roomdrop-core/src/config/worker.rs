//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background reaper/worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron schedule for the upload reaper (six-field cron).
    #[serde(default = "default_upload_reaper_schedule")]
    pub upload_reaper_schedule: String,
    /// Cron schedule for the room reaper.
    #[serde(default = "default_room_reaper_schedule")]
    pub room_reaper_schedule: String,
    /// Cron schedule for version retention pruning.
    #[serde(default = "default_version_prune_schedule")]
    pub version_prune_schedule: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upload_reaper_schedule: default_upload_reaper_schedule(),
            room_reaper_schedule: default_room_reaper_schedule(),
            version_prune_schedule: default_version_prune_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_upload_reaper_schedule() -> String {
    // Hourly, on the hour.
    "0 0 * * * *".to_string()
}

fn default_room_reaper_schedule() -> String {
    // Every 15 minutes.
    "0 */15 * * * *".to_string()
}

fn default_version_prune_schedule() -> String {
    // Daily at 03:30.
    "0 30 3 * * *".to_string()
}
