//! Player and version lookups.
//!
//! Both directories are owned by other services in a full deployment; the
//! collector only reads from them (and creates anonymous players on demand).
//! The in-memory implementations back the daemon's default mode and tests.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use trk_schemas::{Player, PlayerKind, VersionRecord};
use uuid::Uuid;

#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Create a new anonymous player with a generated display name.
    async fn create_anonymous(&self) -> Result<Player>;

    async fn find_anonymous(&self, name: &str) -> Result<Option<Player>>;

    async fn find_identified(&self, username: &str) -> Result<Option<Player>>;
}

#[async_trait]
pub trait VersionDirectory: Send + Sync {
    async fn find_by_tracking_code(&self, tracking_code: &str) -> Result<Option<VersionRecord>>;
}

// ---------------------------------------------------------------------------
// Anonymous names
// ---------------------------------------------------------------------------

const ADJECTIVES: &[&str] = &[
    "Agile", "Bold", "Brave", "Bright", "Calm", "Clever", "Curious", "Daring", "Eager", "Fancy",
    "Gentle", "Happy", "Jolly", "Keen", "Lucky", "Mighty", "Nimble", "Proud", "Quick", "Quiet",
    "Shiny", "Silent", "Swift", "Witty",
];

const ANIMALS: &[&str] = &[
    "Badger", "Beaver", "Falcon", "Ferret", "Fox", "Gecko", "Heron", "Ibis", "Koala", "Lemur",
    "Lynx", "Marmot", "Moose", "Narwhal", "Otter", "Owl", "Panda", "Puffin", "Quokka", "Raven",
    "Seal", "Tapir", "Walrus", "Yak",
];

/// `AdjectiveAnimal` plus a short numeric suffix, e.g. `QuietOtter4821`.
fn anonymous_name() -> String {
    let b = Uuid::new_v4().into_bytes();
    let adj = ADJECTIVES[b[0] as usize % ADJECTIVES.len()];
    let animal = ANIMALS[b[1] as usize % ANIMALS.len()];
    let n = u16::from_le_bytes([b[2], b[3]]) % 10_000;
    format!("{adj}{animal}{n:04}")
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

const NAME_ATTEMPTS: usize = 16;

#[derive(Default)]
struct PlayerTable {
    anonymous: HashMap<String, Player>,
    identified: HashMap<String, Player>,
}

#[derive(Default)]
pub struct MemoryPlayerDirectory {
    inner: RwLock<PlayerTable>,
}

impl MemoryPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or return) an identified player for `username`.
    pub async fn register_identified(&self, username: &str) -> Player {
        let mut t = self.inner.write().await;
        t.identified
            .entry(username.to_string())
            .or_insert_with(|| Player {
                id: Uuid::new_v4().simple().to_string(),
                display_name: username.to_string(),
                kind: PlayerKind::Identified,
            })
            .clone()
    }

    pub async fn anonymous_count(&self) -> usize {
        self.inner.read().await.anonymous.len()
    }
}

#[async_trait]
impl PlayerDirectory for MemoryPlayerDirectory {
    async fn create_anonymous(&self) -> Result<Player> {
        let mut t = self.inner.write().await;
        for _ in 0..NAME_ATTEMPTS {
            let name = anonymous_name();
            if t.anonymous.contains_key(&name) {
                continue;
            }
            let player = Player {
                id: Uuid::new_v4().simple().to_string(),
                display_name: name.clone(),
                kind: PlayerKind::Anonymous,
            };
            t.anonymous.insert(name, player.clone());
            debug!(player_id = %player.id, "anonymous player created");
            return Ok(player);
        }
        bail!("could not generate a free anonymous name after {NAME_ATTEMPTS} attempts")
    }

    async fn find_anonymous(&self, name: &str) -> Result<Option<Player>> {
        Ok(self.inner.read().await.anonymous.get(name).cloned())
    }

    async fn find_identified(&self, username: &str) -> Result<Option<Player>> {
        Ok(self.inner.read().await.identified.get(username).cloned())
    }
}

#[derive(Default)]
pub struct MemoryVersionDirectory {
    by_code: RwLock<HashMap<String, VersionRecord>>,
}

impl MemoryVersionDirectory {
    pub fn new(versions: impl IntoIterator<Item = VersionRecord>) -> Self {
        let by_code = versions
            .into_iter()
            .map(|v| (v.tracking_code.clone(), v))
            .collect();
        Self {
            by_code: RwLock::new(by_code),
        }
    }

    pub async fn insert(&self, version: VersionRecord) {
        self.by_code
            .write()
            .await
            .insert(version.tracking_code.clone(), version);
    }
}

#[async_trait]
impl VersionDirectory for MemoryVersionDirectory {
    async fn find_by_tracking_code(&self, tracking_code: &str) -> Result<Option<VersionRecord>> {
        Ok(self.by_code.read().await.get(tracking_code).cloned())
    }
}
