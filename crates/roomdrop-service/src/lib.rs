//! # roomdrop-service
//!
//! Business rules of the sync engine: room lifecycle and access policy,
//! item mutation with version history, and the chunk ledger flows. Services
//! program against the store traits from `roomdrop-database` and the
//! storage trait from `roomdrop-core`, so they run unchanged on either
//! backend.

pub mod context;
pub mod item;
pub mod room;
pub mod upload;
