//! Type-discriminated item content payloads.

use serde::{Deserialize, Serialize};

/// The content of a shared item.
///
/// Serialized with an internal `type` tag so payloads round-trip through
/// JSON columns and the wire protocol unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemPayload {
    /// A file materialized from a completed chunked upload.
    File {
        /// Key under which the assembled bytes live in storage.
        storage_key: String,
        /// Original file name.
        filename: String,
        /// MIME type.
        mime_type: String,
        /// Size in bytes.
        size_bytes: i64,
        /// Whether the content was encrypted client-side.
        encrypted: bool,
        /// Base64 initialization vector for encrypted content.
        iv: Option<String>,
    },
    /// A code snippet with syntax highlighting metadata.
    Snippet {
        /// Language identifier (e.g. "rust").
        language: String,
        /// Snippet body.
        content: String,
    },
    /// Free-form text.
    Text {
        /// Text body.
        content: String,
    },
    /// A shared hyperlink.
    Link {
        /// Target URL.
        url: String,
        /// Optional display title.
        title: Option<String>,
    },
}

impl ItemPayload {
    /// Short type name for logging and storage.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Snippet { .. } => "snippet",
            Self::Text { .. } => "text",
            Self::Link { .. } => "link",
        }
    }

    /// Byte size of this payload as stored (serialized JSON length for
    /// inline content, declared file size for file payloads).
    pub fn size_bytes(&self) -> i64 {
        match self {
            Self::File { size_bytes, .. } => *size_bytes,
            other => serde_json::to_vec(other).map(|v| v.len() as i64).unwrap_or(0),
        }
    }
}
