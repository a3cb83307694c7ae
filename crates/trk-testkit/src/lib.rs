//! trk-testkit
//!
//! Shared fixtures for cross-crate scenario tests under `tests/`.

pub mod consumers;
pub mod harness;

pub use consumers::{FailingConsumer, Received, RecordingConsumer};
pub use harness::{
    demo_version, marker, statement, tagged_gameplay, TestCollector, GAME_ID, TRACKING_CODE,
    VERSION_ID,
};
