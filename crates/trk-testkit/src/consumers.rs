//! Scripted consumers for dispatch scenarios.
//!
//! No I/O. Every accepted delivery is copied into memory so tests can assert
//! on exactly what a sink observed.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use trk_consumers::{Consumer, ConsumerRejection, Delivery};
use trk_schemas::Trace;
use uuid::Uuid;

/// Owned copy of a [`Delivery`].
#[derive(Debug, Clone)]
pub struct Received {
    pub player_id: String,
    pub version_id: String,
    pub gameplay_id: Uuid,
    pub raw: Vec<Value>,
    pub traces: Vec<Trace>,
}

impl From<Delivery<'_>> for Received {
    fn from(d: Delivery<'_>) -> Self {
        Self {
            player_id: d.player_id.to_string(),
            version_id: d.version_id.to_string(),
            gameplay_id: d.gameplay_id,
            raw: d.raw.to_vec(),
            traces: d.traces.to_vec(),
        }
    }
}

/// Accepts everything and remembers it.
pub struct RecordingConsumer {
    name: String,
    received: Mutex<Vec<Received>>,
}

impl RecordingConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub async fn received(&self) -> Vec<Received> {
        self.received.lock().await.clone()
    }

    /// All traces across deliveries, in arrival order.
    pub async fn traces(&self) -> Vec<Trace> {
        self.received
            .lock()
            .await
            .iter()
            .flat_map(|r| r.traces.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl Consumer for RecordingConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, delivery: Delivery<'_>) -> Result<(), ConsumerRejection> {
        self.received.lock().await.push(delivery.into());
        Ok(())
    }
}

/// Rejects every batch with a fixed rejection, counting calls.
pub struct FailingConsumer {
    name: String,
    rejection: ConsumerRejection,
    calls: AtomicUsize,
}

impl FailingConsumer {
    pub fn new(name: impl Into<String>, rejection: ConsumerRejection) -> Self {
        Self {
            name: name.into(),
            rejection,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for FailingConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, _delivery: Delivery<'_>) -> Result<(), ConsumerRejection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.rejection.clone())
    }
}
