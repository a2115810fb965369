//! Room lifecycle and access policy.

pub mod service;

pub use service::{CreateRoomParams, RoomService};
