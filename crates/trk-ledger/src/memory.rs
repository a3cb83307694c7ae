//! In-process repositories.
//!
//! Each repository guards its whole state with one async mutex, which makes
//! every trait method atomic with respect to concurrent callers.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use trk_schemas::{AuthorizationToken, Gameplay};
use uuid::Uuid;

use crate::repo::{AuthorizationTokenRepository, GameplayRepository};

type PairKey = (String, String);

#[derive(Default)]
struct GameplayTable {
    rows: HashMap<Uuid, Gameplay>,
    /// (player_id, version_id) -> active gameplay id
    active: HashMap<PairKey, Uuid>,
}

impl GameplayTable {
    fn active_for(&self, player_id: &str, version_id: &str) -> Option<&Gameplay> {
        self.active
            .get(&(player_id.to_string(), version_id.to_string()))
            .and_then(|id| self.rows.get(id))
    }

    fn activate(&mut self, mut g: Gameplay) -> Gameplay {
        g.active = true;
        self.active
            .insert((g.player_id.clone(), g.version_id.clone()), g.id);
        self.rows.insert(g.id, g.clone());
        g
    }
}

#[derive(Default)]
pub struct MemoryGameplayRepository {
    inner: Mutex<GameplayTable>,
}

impl MemoryGameplayRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of gameplay rows ever stored (active or retired).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl GameplayRepository for MemoryGameplayRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Gameplay>> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn find_active(&self, player_id: &str, version_id: &str) -> Result<Option<Gameplay>> {
        Ok(self
            .inner
            .lock()
            .await
            .active_for(player_id, version_id)
            .cloned())
    }

    async fn insert_if_absent(&self, candidate: Gameplay) -> Result<Gameplay> {
        let mut t = self.inner.lock().await;
        if let Some(existing) = t.active_for(&candidate.player_id, &candidate.version_id) {
            return Ok(existing.clone());
        }
        Ok(t.activate(candidate))
    }

    async fn increment_session(&self, candidate: Gameplay) -> Result<Gameplay> {
        let mut t = self.inner.lock().await;
        let key = (candidate.player_id.clone(), candidate.version_id.clone());
        if let Some(id) = t.active.get(&key).copied() {
            if let Some(row) = t.rows.get_mut(&id) {
                row.session_count += 1;
                return Ok(row.clone());
            }
        }
        let mut fresh = candidate;
        fresh.session_count = 1;
        Ok(t.activate(fresh))
    }

    async fn replace_active(&self, expected: Uuid, replacement: Gameplay) -> Result<Gameplay> {
        let mut t = self.inner.lock().await;
        let key = (
            replacement.player_id.clone(),
            replacement.version_id.clone(),
        );

        match t.active.get(&key).copied() {
            Some(current) if current == expected => {
                if let Some(old) = t.rows.get_mut(&expected) {
                    old.active = false;
                }
                Ok(t.activate(replacement))
            }
            Some(current) => match t.rows.get(&current) {
                Some(g) => Ok(g.clone()),
                None => bail!("active index points at missing gameplay {current}"),
            },
            // Nothing active for the pair: the expected gameplay is unknown here.
            None => Ok(t.activate(replacement)),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenRepository {
    inner: Mutex<HashMap<String, AuthorizationToken>>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationTokenRepository for MemoryTokenRepository {
    async fn insert(&self, token: AuthorizationToken) -> Result<()> {
        let mut t = self.inner.lock().await;
        if t.contains_key(&token.token) {
            bail!("authorization token collision");
        }
        t.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<AuthorizationToken>> {
        Ok(self.inner.lock().await.get(token).cloned())
    }

    async fn touch(&self, token: &str, now: DateTime<Utc>) -> Result<Option<AuthorizationToken>> {
        let mut t = self.inner.lock().await;
        Ok(t.get_mut(token).map(|row| {
            row.last_accessed = now;
            row.clone()
        }))
    }

    async fn mark_advanced(
        &self,
        token: &str,
        expected: Uuid,
        replacement: &Gameplay,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationToken>> {
        let mut t = self.inner.lock().await;
        let Some(row) = t.get_mut(token) else {
            return Ok(None);
        };
        if row.advanced_from.is_some() || row.gameplay_id != expected {
            return Ok(None);
        }
        row.advanced_from = Some(expected);
        row.gameplay_id = replacement.id;
        row.session = replacement.session_count;
        row.first_session_started = replacement.first_started;
        row.session_started = now;
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gp(player: &str, version: &str) -> Gameplay {
        Gameplay {
            id: Uuid::new_v4(),
            player_id: player.to_string(),
            version_id: version.to_string(),
            session_count: 0,
            first_started: Utc::now(),
            active: true,
        }
    }

    #[tokio::test]
    async fn increment_creates_then_increments() {
        let repo = MemoryGameplayRepository::new();
        let a = repo.increment_session(gp("p", "v")).await.unwrap();
        let b = repo.increment_session(gp("p", "v")).await.unwrap();
        assert_eq!(a.session_count, 1);
        assert_eq!(b.session_count, 2);
        assert_eq!(a.id, b.id);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn replace_active_is_compare_and_swap() {
        let repo = MemoryGameplayRepository::new();
        let g = repo.increment_session(gp("p", "v")).await.unwrap();

        let first = repo.replace_active(g.id, gp("p", "v")).await.unwrap();
        assert_ne!(first.id, g.id);

        // Second swap against the stale id must not mint another row.
        let second = repo.replace_active(g.id, gp("p", "v")).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(repo.len().await, 2);

        let old = repo.find_by_id(g.id).await.unwrap().unwrap();
        assert!(!old.active);
    }

    #[tokio::test]
    async fn touch_unknown_token_is_none() {
        let repo = MemoryTokenRepository::new();
        assert!(repo.touch("nope", Utc::now()).await.unwrap().is_none());
    }
}
