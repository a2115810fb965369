//! Item version domain entities.

pub mod model;

pub use model::Version;
