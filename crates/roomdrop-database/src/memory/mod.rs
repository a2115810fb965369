//! In-memory store backend.
//!
//! Backs single-node ephemeral deployments and the test suite. Every
//! conditional-update contract of the store traits is honored under
//! dashmap's per-entry locking, so service-level behavior is identical to
//! the PostgreSQL backend.

pub mod item;
pub mod room;
pub mod upload;
pub mod version;

pub use item::MemoryItemStore;
pub use room::MemoryRoomStore;
pub use upload::MemoryUploadStore;
pub use version::MemoryVersionStore;
