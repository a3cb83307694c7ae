//! Typed view over the merged config document.
//!
//! # Contract
//! - Every section is optional; missing keys fall back to [`Default`].
//! - Secrets are referenced by env var NAME (`*_env` keys) and resolved once
//!   via [`CollectorConfig::resolve_secrets`]. Resolved values are redacted
//!   in `Debug` output.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use trk_schemas::VersionRecord;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3300";
pub const DEFAULT_BOUNDARY_VERB: &str = "gameplay-started";
pub const DEFAULT_TRACKING_EXTENSION: &str = "tracking";
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;
pub const DEFAULT_DATABASE_URL_ENV: &str = "TRK_DATABASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub server: ServerSection,
    pub collector: CollectorSection,
    pub storage: StorageSection,
    pub consumers: ConsumersSection,
    pub directory: DirectorySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    /// Base URL reported as the actor account home page.
    pub home_page: String,
    /// URI tail of the verb that opens a new gameplay mid-batch.
    pub boundary_verb: String,
    /// Key under `object.definition.extensions` holding the tracking tag.
    pub tracking_extension: String,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            home_page: "http://localhost:3300".to_string(),
            boundary_verb: DEFAULT_BOUNDARY_VERB.to_string(),
            tracking_extension: DEFAULT_TRACKING_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub kind: StorageKind,
    /// Env var holding the Postgres URL (only read when `kind = postgres`).
    pub database_url_env: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsumersSection {
    pub trace_log: Option<TraceLogSection>,
    pub stream: StreamSection,
    pub forward: Option<ForwardSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceLogSection {
    pub path: String,
    #[serde(default = "default_true")]
    pub hash_chain: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub capacity: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardSection {
    pub url: String,
    /// Env var NAME holding a bearer credential for the remote store.
    #[serde(default)]
    pub auth_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    pub versions: Vec<VersionRecord>,
    /// Usernames resolvable through `Bearer <username>` on start.
    pub identified_players: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Runtime-resolved secrets. Built once at startup.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    pub forward_auth: Option<String>,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("forward_auth", &self.forward_auth.as_ref().map(|_| "<REDACTED>"))
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl CollectorConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: CollectorConfig =
            serde_json::from_value(v.clone()).context("collector config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.collector.boundary_verb.trim().is_empty() {
            bail!("CONFIG_INVALID: collector.boundary_verb must not be empty");
        }
        if self.collector.tracking_extension.trim().is_empty() {
            bail!("CONFIG_INVALID: collector.tracking_extension must not be empty");
        }
        if self.consumers.stream.capacity == 0 {
            bail!("CONFIG_INVALID: consumers.stream.capacity must be > 0");
        }
        let mut seen = std::collections::BTreeSet::new();
        for v in &self.directory.versions {
            if !seen.insert(v.tracking_code.as_str()) {
                bail!(
                    "CONFIG_INVALID: duplicate tracking code '{}' in directory.versions",
                    v.tracking_code
                );
            }
        }
        Ok(())
    }

    /// Read the env vars named in config. Absent or empty vars resolve to `None`;
    /// a Postgres storage kind without a database URL is an error.
    pub fn resolve_secrets(&self) -> Result<ResolvedSecrets> {
        self.resolve_secrets_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_secrets_with<F>(&self, lookup: F) -> Result<ResolvedSecrets>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        let forward_auth = self
            .consumers
            .forward
            .as_ref()
            .and_then(|f| f.auth_env.as_deref())
            .and_then(non_empty);

        let database_url = non_empty(&self.storage.database_url_env);
        if self.storage.kind == StorageKind::Postgres && database_url.is_none() {
            bail!(
                "SECRET_MISSING: storage.kind=postgres requires env var {}",
                self.storage.database_url_env
            );
        }

        Ok(ResolvedSecrets {
            forward_auth,
            database_url,
        })
    }
}
