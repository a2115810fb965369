//! Core trait definitions implemented by the backend crates.

pub mod storage;
