//! Room domain entities.

pub mod code;
pub mod model;
pub mod settings;

pub use code::RoomCode;
pub use model::{Room, RoomAccess, RoomLifespan, RoomMode};
pub use settings::RoomSettings;
