//! Upload lifecycle status.

use serde::{Deserialize, Serialize};

/// Status of a chunked upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Created, no chunk acknowledged yet.
    Pending,
    /// At least one chunk acknowledged.
    Uploading,
    /// All chunks acknowledged and the item materialized.
    Completed,
    /// Upload failed.
    Failed,
    /// Explicitly cancelled by the client. Terminal.
    Cancelled,
}

impl UploadStatus {
    /// Return the status as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further chunk acknowledgments.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States subject to the expiry reaper.
    pub fn is_reapable(&self) -> bool {
        matches!(self, Self::Pending | Self::Uploading)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = roomdrop_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(roomdrop_core::AppError::validation(format!(
                "Invalid upload status: '{s}'"
            ))),
        }
    }
}
