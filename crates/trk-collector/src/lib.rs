//! trk-collector
//!
//! The ingestion core: resolves players and tracking codes for `start`,
//! validates tokens and runs split -> normalize -> dispatch for `track`.

pub mod auth;
pub mod directory;
pub mod error;
pub mod service;
pub mod splitter;

pub use auth::{parse_start_credentials, StartCredentials};
pub use directory::{MemoryPlayerDirectory, MemoryVersionDirectory, PlayerDirectory, VersionDirectory};
pub use error::CollectorError;
pub use service::{Collector, CollectorOptions, TrackAck, TRACK_SUCCESS};
pub use splitter::{statements_from, BatchSplitter, BoundaryHandler, SplitBatch, STATEMENTS_NOT_ARRAY};
