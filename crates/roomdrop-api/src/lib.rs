//! # roomdrop-api
//!
//! The external surface of the sync engine: an axum HTTP API for rooms,
//! items, and the upload sub-protocol, plus the per-room WebSocket carrying
//! named events. Domain errors map onto HTTP statuses through one
//! [`error::ApiError`] boundary.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
