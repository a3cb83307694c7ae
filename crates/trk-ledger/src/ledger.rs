//! Gameplay lifecycle on top of a [`GameplayRepository`].

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};
use trk_schemas::Gameplay;
use uuid::Uuid;

use crate::repo::GameplayRepository;

#[derive(Clone)]
pub struct GameplayLedger {
    repo: Arc<dyn GameplayRepository>,
}

impl GameplayLedger {
    pub fn new(repo: Arc<dyn GameplayRepository>) -> Self {
        Self { repo }
    }

    fn fresh(player_id: &str, version_id: &str, session_count: i64) -> Gameplay {
        Gameplay {
            id: Uuid::new_v4(),
            player_id: player_id.to_string(),
            version_id: version_id.to_string(),
            session_count,
            first_started: Utc::now(),
            active: true,
        }
    }

    /// Active gameplay for the pair, created with `session_count = 0` if absent.
    pub async fn ensure_gameplay(&self, player_id: &str, version_id: &str) -> Result<Gameplay> {
        self.repo
            .insert_if_absent(Self::fresh(player_id, version_id, 0))
            .await
            .context("ensure_gameplay failed")
    }

    /// Open a new session: `session_count + 1`, creating the gameplay with
    /// `session_count = 1` when the pair has none.
    pub async fn start_session(&self, player_id: &str, version_id: &str) -> Result<Gameplay> {
        let g = self
            .repo
            .increment_session(Self::fresh(player_id, version_id, 1))
            .await
            .context("start_session failed")?;
        debug!(gameplay_id = %g.id, session = g.session_count, "session started");
        Ok(g)
    }

    /// Retire `current` and open a new gameplay for the pair.
    ///
    /// Compare-and-swap: if `current` is no longer the active gameplay, the
    /// already-active one is returned and nothing new is minted.
    pub async fn advance_to_new_gameplay(
        &self,
        player_id: &str,
        version_id: &str,
        current: Uuid,
    ) -> Result<Gameplay> {
        let g = self
            .repo
            .replace_active(current, Self::fresh(player_id, version_id, 1))
            .await
            .context("advance_to_new_gameplay failed")?;
        if g.id != current {
            info!(from = %current, to = %g.id, "gameplay advanced");
        }
        Ok(g)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Gameplay>> {
        self.repo.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGameplayRepository;

    fn ledger() -> GameplayLedger {
        GameplayLedger::new(Arc::new(MemoryGameplayRepository::new()))
    }

    #[tokio::test]
    async fn ensure_is_idempotent_and_does_not_count() {
        let l = ledger();
        let a = l.ensure_gameplay("p", "v").await.unwrap();
        let b = l.ensure_gameplay("p", "v").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.session_count, 0);

        let s = l.start_session("p", "v").await.unwrap();
        assert_eq!(s.id, a.id);
        assert_eq!(s.session_count, 1);
    }

    #[tokio::test]
    async fn pairs_are_independent() {
        let l = ledger();
        let a = l.start_session("p", "v1").await.unwrap();
        let b = l.start_session("p", "v2").await.unwrap();
        let c = l.start_session("q", "v1").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(c.session_count, 1);
    }

    #[tokio::test]
    async fn advance_then_start_continues_new_gameplay() {
        let l = ledger();
        let g = l.start_session("p", "v").await.unwrap();
        let g2 = l.advance_to_new_gameplay("p", "v", g.id).await.unwrap();
        assert_ne!(g.id, g2.id);
        assert_eq!(g2.session_count, 1);

        let next = l.start_session("p", "v").await.unwrap();
        assert_eq!(next.id, g2.id);
        assert_eq!(next.session_count, 2);
    }
}
