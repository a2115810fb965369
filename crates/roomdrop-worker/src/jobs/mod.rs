//! Built-in job handler implementations.

pub mod reaper;

pub use reaper::{RoomReaperHandler, UploadReaperHandler, VersionRetentionHandler};
