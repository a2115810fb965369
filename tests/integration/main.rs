//! Black-box integration tests over the in-memory backend.

mod helpers;

mod item_test;
mod room_test;
mod sync_test;
mod upload_test;
mod ws_test;
