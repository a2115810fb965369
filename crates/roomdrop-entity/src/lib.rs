//! # roomdrop-entity
//!
//! Domain entity models for RoomDrop. Every struct in this crate represents
//! a persisted record or a domain value object. All entities derive `Debug`,
//! `Clone`, `Serialize`, and `Deserialize`; persistence-layer row mapping
//! lives in `roomdrop-database`, not here.

pub mod item;
pub mod presence;
pub mod room;
pub mod upload;
pub mod version;
