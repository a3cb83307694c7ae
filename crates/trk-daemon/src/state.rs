//! Shared runtime state for trk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. `from_config` is the
//! composition root: storage, directories and consumers are all wired here.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use trk_collector::{Collector, CollectorOptions, MemoryPlayerDirectory, MemoryVersionDirectory};
use trk_config::{CollectorConfig, ResolvedSecrets, StorageKind};
use trk_consumers::{BroadcastConsumer, Dispatcher, ForwardConsumer, TraceLogConsumer};
use trk_ledger::{GameplayLedger, PgGameplayRepository, PgTokenRepository, TokenStore};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    pub collector: Arc<Collector>,
    /// Also registered on the collector's dispatcher; backs `/v1/traces/stream`.
    pub stream: BroadcastConsumer,
    /// Directory handle kept so operators/tests can register players.
    pub players: Arc<MemoryPlayerDirectory>,
}

impl AppState {
    /// In-memory storage, default options, stream consumer only.
    pub fn in_memory(cfg: &CollectorConfig) -> Self {
        let players = Arc::new(MemoryPlayerDirectory::new());
        let stream = BroadcastConsumer::new(cfg.consumers.stream.capacity);
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.add(Arc::new(stream.clone()));

        let collector = Collector::new(
            trk_ledger::in_memory(),
            players.clone(),
            Arc::new(MemoryVersionDirectory::new(cfg.directory.versions.clone())),
            dispatcher,
            CollectorOptions::from(&cfg.collector),
        );

        Self {
            build: build_info(),
            collector: Arc::new(collector),
            stream,
            players,
        }
    }

    /// Full composition from config: storage backend, consumers, directories.
    pub async fn from_config(cfg: &CollectorConfig, secrets: &ResolvedSecrets) -> Result<Self> {
        let tokens = match cfg.storage.kind {
            StorageKind::Memory => trk_ledger::in_memory(),
            StorageKind::Postgres => {
                let url = secrets
                    .database_url
                    .as_deref()
                    .context("storage.kind=postgres but no database url resolved")?;
                let pool = trk_ledger::pg::connect(url).await?;
                trk_ledger::pg::migrate(&pool).await?;
                let ledger = GameplayLedger::new(Arc::new(PgGameplayRepository::new(pool.clone())));
                TokenStore::new(ledger, Arc::new(PgTokenRepository::new(pool)))
            }
        };

        let dispatcher = Arc::new(Dispatcher::new());

        if let Some(log) = &cfg.consumers.trace_log {
            let consumer = TraceLogConsumer::open(&log.path, log.hash_chain)
                .with_context(|| format!("open trace log {}", log.path))?;
            dispatcher.add(Arc::new(consumer));
        }

        let stream = BroadcastConsumer::new(cfg.consumers.stream.capacity);
        dispatcher.add(Arc::new(stream.clone()));

        if let Some(fwd) = &cfg.consumers.forward {
            dispatcher.add(Arc::new(ForwardConsumer::new(
                fwd.url.clone(),
                secrets.forward_auth.clone(),
            )));
        }

        let players = Arc::new(MemoryPlayerDirectory::new());
        for username in &cfg.directory.identified_players {
            players.register_identified(username).await;
        }

        info!(
            storage = ?cfg.storage.kind,
            consumers = dispatcher.len(),
            versions = cfg.directory.versions.len(),
            "collector composed"
        );

        let collector = Collector::new(
            tokens,
            players.clone(),
            Arc::new(MemoryVersionDirectory::new(cfg.directory.versions.clone())),
            dispatcher,
            CollectorOptions::from(&cfg.collector),
        );

        Ok(Self {
            build: build_info(),
            collector: Arc::new(collector),
            stream,
            players,
        })
    }
}

fn build_info() -> BuildInfo {
    BuildInfo {
        service: "trk-daemon",
        version: env!("CARGO_PKG_VERSION"),
    }
}
