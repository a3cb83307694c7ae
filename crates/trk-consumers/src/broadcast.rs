//! In-process publish/subscribe consumer.
//!
//! Every trace of an accepted batch is published on a tokio broadcast
//! channel. Subscribers that fall behind lose messages (`Lagged`); the
//! consumer itself never fails, with or without subscribers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use trk_schemas::Trace;

use crate::consumer::{Consumer, ConsumerRejection, Delivery};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamedTrace {
    pub player_id: String,
    pub version_id: String,
    pub trace: Trace,
}

#[derive(Clone)]
pub struct BroadcastConsumer {
    tx: broadcast::Sender<StreamedTrace>,
}

impl BroadcastConsumer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamedTrace> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl Consumer for BroadcastConsumer {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn accept(&self, delivery: Delivery<'_>) -> Result<(), ConsumerRejection> {
        for t in delivery.traces {
            let msg = StreamedTrace {
                player_id: delivery.player_id.to_string(),
                version_id: delivery.version_id.to_string(),
                trace: t.clone(),
            };
            // Err only means nobody is listening.
            if self.tx.send(msg).is_err() {
                trace!("no trace stream subscribers");
                break;
            }
        }
        Ok(())
    }
}
