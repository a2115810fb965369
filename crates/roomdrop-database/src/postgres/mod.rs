//! PostgreSQL store backend.
//!
//! All atomic check-and-set semantics live in single conditional
//! statements or uniqueness constraints so the backend stays correct when
//! the service runs as multiple replicas.

pub mod item;
pub mod room;
pub mod upload;
pub mod version;

pub use item::PgItemStore;
pub use room::PgRoomStore;
pub use upload::PgUploadStore;
pub use version::PgVersionStore;

use roomdrop_core::error::{AppError, ErrorKind};

/// Map a sqlx error into the application taxonomy.
pub(crate) fn db_err(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, context.to_string(), err)
}

/// Whether a sqlx error is a uniqueness-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
