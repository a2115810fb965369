//! # roomdrop-realtime
//!
//! Process-local real-time subsystems: the connection pool, the per-room
//! presence table, and the event broadcast bus. Delivery is at-most-once
//! per publish; a disconnected peer simply misses events generated while it
//! was offline — catch-up is the reconciliation queue's job, not the bus's.

pub mod connection;
pub mod engine;
pub mod message;
pub mod room_table;

pub use engine::RealtimeEngine;
pub use room_table::RoomTable;
