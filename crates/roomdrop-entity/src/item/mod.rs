//! Item domain entities.

pub mod model;
pub mod payload;

pub use model::Item;
pub use payload::ItemPayload;
