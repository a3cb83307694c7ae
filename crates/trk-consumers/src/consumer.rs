//! Consumer contract.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use trk_schemas::Trace;
use uuid::Uuid;

/// One normalized batch handed to every consumer.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub player_id: &'a str,
    pub version_id: &'a str,
    /// Gameplay the batch was authenticated with. Individual traces may carry
    /// a newer gameplay id if the batch crossed a boundary marker.
    pub gameplay_id: Uuid,
    /// Tagged statements, in submission order.
    pub raw: &'a [Value],
    /// One trace per raw statement, same order.
    pub traces: &'a [Trace],
}

/// Why a consumer refused a batch.
///
/// `status` is surfaced verbatim to the client when present; a status-less
/// rejection is reported as 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRejection {
    pub status: Option<u16>,
    pub message: String,
}

impl ConsumerRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConsumerRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(s) => write!(f, "consumer rejected batch status={s}: {}", self.message),
            None => write!(f, "consumer rejected batch: {}", self.message),
        }
    }
}

impl std::error::Error for ConsumerRejection {}

/// A sink for normalized traces.
///
/// Implementations must be `Send + Sync`; the dispatcher runs all consumers
/// of one batch concurrently and holds them as `Arc<dyn Consumer>`.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    async fn accept(&self, delivery: Delivery<'_>) -> Result<(), ConsumerRejection>;
}
