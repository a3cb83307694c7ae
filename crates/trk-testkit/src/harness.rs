//! In-memory composition of a full collector plus statement builders.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use trk_collector::{Collector, CollectorOptions, MemoryPlayerDirectory, MemoryVersionDirectory};
use trk_consumers::{Consumer, Dispatcher};
use trk_schemas::{StartOutcome, VersionRecord};

pub const TRACKING_CODE: &str = "demo-code";
pub const VERSION_ID: &str = "demo-version";
pub const GAME_ID: &str = "demo-game";

pub fn demo_version() -> VersionRecord {
    VersionRecord {
        id: VERSION_ID.to_string(),
        game_id: GAME_ID.to_string(),
        tracking_code: TRACKING_CODE.to_string(),
        activity_id: None,
    }
}

pub struct TestCollector {
    pub collector: Arc<Collector>,
    pub players: Arc<MemoryPlayerDirectory>,
    pub versions: Arc<MemoryVersionDirectory>,
}

impl TestCollector {
    /// One registered version ([`demo_version`]), no consumers.
    pub fn new() -> Self {
        Self::with_options(CollectorOptions::default())
    }

    pub fn with_options(options: CollectorOptions) -> Self {
        let players = Arc::new(MemoryPlayerDirectory::new());
        let versions = Arc::new(MemoryVersionDirectory::new([demo_version()]));
        let collector = Collector::new(
            trk_ledger::in_memory(),
            players.clone(),
            versions.clone(),
            Arc::new(Dispatcher::new()),
            options,
        );
        Self {
            collector: Arc::new(collector),
            players,
            versions,
        }
    }

    pub fn add_consumer(&self, consumer: Arc<dyn Consumer>) {
        self.collector.dispatcher().add(consumer);
    }

    /// `start` as a brand new anonymous player.
    pub async fn start_anonymous(&self) -> Result<StartOutcome> {
        self.collector
            .start(TRACKING_CODE, None, None)
            .await
            .map_err(|e| anyhow!("start failed: {e}"))
    }

    /// `start` again as the anonymous player behind `previous`.
    pub async fn restart(&self, previous: &StartOutcome) -> Result<StartOutcome> {
        let header = format!("a:{}", previous.player_name);
        self.collector
            .start(TRACKING_CODE, Some(&header), None)
            .await
            .map_err(|e| anyhow!("restart failed: {e}"))
    }
}

impl Default for TestCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Statement builders
// ---------------------------------------------------------------------------

/// Minimal well-formed statement with verb tail `verb`.
pub fn statement(verb: &str) -> Value {
    json!({
        "actor": { "name": "player" },
        "timestamp": "2024-03-01T10:00:00Z",
        "verb": { "id": format!("http://adlnet.gov/expapi/verbs/{verb}") },
        "object": {
            "id": "http://example.org/games/demo/level1",
            "definition": { "type": "https://w3id.org/xapi/seriousgames/activity-types/level" }
        }
    })
}

/// Boundary marker under the default boundary verb.
pub fn marker() -> Value {
    statement("gameplay-started")
}

/// Gameplay id injected into `statement` under the default extension key.
pub fn tagged_gameplay(statement: &Value) -> Option<String> {
    statement
        .pointer("/object/definition/extensions/tracking/gameplayId")
        .and_then(Value::as_str)
        .map(str::to_string)
}
