//! Chunk ledger entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomdrop_core::types::id::{ItemId, RoomId, UploadId};

use super::status::UploadStatus;

/// One addressable byte-range unit of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Zero-based chunk index.
    pub index: i32,
    /// Entity tag returned by the storage layer after the chunk was written.
    pub etag: Option<String>,
    /// Whether this chunk has been acknowledged.
    pub uploaded: bool,
}

impl ChunkRecord {
    /// An unfilled slot for the given index.
    pub fn empty(index: i32) -> Self {
        Self {
            index,
            etag: None,
            uploaded: false,
        }
    }
}

/// A chunked, resumable transfer of a file's bytes prior to item
/// materialization.
///
/// Invariant: `chunks.len() == total_chunks`, slot `i` holds chunk index `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    /// Unique upload identifier.
    pub id: UploadId,
    /// The room this upload targets.
    pub room_id: RoomId,
    /// External identity of the uploading peer, if known.
    pub uploaded_by: Option<String>,
    /// Intended file name.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
    /// Declared total size in bytes.
    pub total_size: i64,
    /// Key prefix under which chunk bytes are stored.
    pub storage_key: String,
    /// Identifier of an external multi-part transfer, if one backs this
    /// upload.
    pub external_transfer_id: Option<String>,
    /// Whether the content is encrypted client-side.
    pub encrypted: bool,
    /// Base64 initialization vector for encrypted content.
    pub iv: Option<String>,
    /// Ledger of chunk slots, indexed by chunk number.
    pub chunks: Vec<ChunkRecord>,
    /// Total number of chunks expected.
    pub total_chunks: i32,
    /// Current lifecycle status.
    pub status: UploadStatus,
    /// The item materialized at finalize (makes finalize idempotent).
    pub item_id: Option<ItemId>,
    /// Hard expiry; unfinished uploads past this point are reaped.
    pub expires_at: DateTime<Utc>,
    /// When the upload was initiated.
    pub created_at: DateTime<Utc>,
}

impl Upload {
    /// Number of chunks acknowledged so far.
    pub fn uploaded_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.uploaded).count()
    }

    /// True iff every chunk slot has been acknowledged at least once.
    pub fn is_complete(&self) -> bool {
        self.total_chunks > 0 && self.chunks.iter().all(|c| c.uploaded)
    }

    /// Upload progress as a percentage, rounded up.
    pub fn progress(&self) -> u8 {
        if self.total_chunks <= 0 {
            return 0;
        }
        let uploaded = self.uploaded_count() as u64;
        let total = self.total_chunks as u64;
        (uploaded * 100).div_ceil(total) as u8
    }
}
