//! # roomdrop-storage
//!
//! Byte storage for upload chunks and assembled files. The engine treats
//! stored bytes as opaque; this crate implements the
//! [`roomdrop_core::traits::storage::StorageProvider`] trait for the local
//! filesystem and computes the entity tags returned to uploading clients.

pub mod etag;
pub mod providers;

pub use providers::local::LocalStorageProvider;
