//! # roomdrop-database
//!
//! Persistence layer for RoomDrop. Defines the store traits the services
//! program against and two backends implementing them:
//!
//! - [`postgres`] — sqlx/PostgreSQL, for multi-replica deployments. All
//!   check-and-set semantics (chunk-ack idempotence, version-number
//!   uniqueness) are enforced by uniqueness constraints and conditional
//!   single-statement updates, never in-process locks.
//! - [`memory`] — dashmap-backed, for single-node ephemeral deployments and
//!   tests. Upholds the identical conditional-update contracts under its
//!   per-entry locking.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod provider;
pub mod store;

pub use provider::StoreManager;
pub use store::{ItemStore, RoomStore, UploadStore, VersionStore};
