//! Chunked upload flows.

pub mod service;

pub use service::{InitUploadParams, UploadService};
