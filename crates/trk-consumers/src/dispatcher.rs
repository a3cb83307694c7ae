//! Consumer fan-out.
//!
//! `dispatch` runs every registered consumer concurrently and waits for all
//! of them. The verdict is deterministic: success iff every consumer
//! succeeded, otherwise the first failure in registration order.
//!
//! There is no rollback. A consumer that already wrote keeps its write even
//! when a sibling fails (at-least-once, best-effort delivery).

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::consumer::{Consumer, ConsumerRejection, Delivery};

/// Status reported for a rejection that carries none.
pub const DEFAULT_REJECTION_STATUS: u16 = 400;

/// The single verdict returned to the caller when a dispatch fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub consumer: String,
    pub status: u16,
    pub message: String,
    /// How many consumers failed in total.
    pub failures: usize,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "consumer '{}' failed status={}: {}",
            self.consumer, self.status, self.message
        )
    }
}

impl std::error::Error for DispatchError {}

#[derive(Default)]
pub struct Dispatcher {
    consumers: RwLock<Vec<Arc<dyn Consumer>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, consumer: Arc<dyn Consumer>) {
        debug!(consumer = consumer.name(), "consumer registered");
        self.consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(consumer);
    }

    pub fn clear(&self) {
        self.consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Consumer>> {
        self.consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn dispatch(&self, delivery: Delivery<'_>) -> Result<(), DispatchError> {
        let consumers = self.snapshot();

        let outcomes = join_all(consumers.iter().map(|c| c.accept(delivery))).await;

        let failed: Vec<(&Arc<dyn Consumer>, ConsumerRejection)> = consumers
            .iter()
            .zip(outcomes)
            .filter_map(|(c, r)| r.err().map(|e| (c, e)))
            .collect();

        for (c, e) in &failed {
            warn!(
                consumer = c.name(),
                status = ?e.status,
                gameplay_id = %delivery.gameplay_id,
                "consumer rejected batch: {}",
                e.message
            );
        }

        let failures = failed.len();
        match failed.into_iter().next() {
            None => {
                debug!(
                    consumers = consumers.len(),
                    traces = delivery.traces.len(),
                    "batch dispatched"
                );
                Ok(())
            }
            Some((c, e)) => Err(DispatchError {
                consumer: c.name().to_string(),
                status: e.status.unwrap_or(DEFAULT_REJECTION_STATUS),
                message: e.message,
                failures,
            }),
        }
    }
}
