//! # roomdrop-client
//!
//! The client half of the sync engine: a durable, SQLite-backed queue of
//! operations performed while disconnected, a drain worker that replays
//! them against the server in order once connectivity resumes, and a local
//! item cache the server's authoritative responses are merged into.
//!
//! Lifecycle signals surface as typed [`sync::SyncEvent`]s on a broadcast
//! channel rather than ad hoc callbacks.

pub mod op;
pub mod remote;
pub mod store;
pub mod sync;

pub use op::{Operation, OpStatus, PendingOperation};
pub use remote::{HttpRemoteApi, RemoteApi};
pub use store::ClientStore;
pub use sync::{SyncEngine, SyncEvent};
