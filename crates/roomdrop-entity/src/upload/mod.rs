//! Chunked upload domain entities.

pub mod model;
pub mod status;

pub use model::{ChunkRecord, Upload};
pub use status::UploadStatus;
