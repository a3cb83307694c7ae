//! Request and response types for trk-daemon HTTP endpoints.
//!
//! `start` and `track` responses reuse `trk_schemas::StartOutcome` and
//! `trk_collector::TrackAck` directly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub status: u16,
}
