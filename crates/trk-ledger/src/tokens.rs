//! Authorization token store.
//!
//! A token is minted per `start()` and identifies (player, version, gameplay,
//! session). `track()` validates and refreshes it. `advance()` is the only
//! path that moves a token onto a new gameplay, and it does so at most once.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, info};
use trk_schemas::{AuthorizationToken, Gameplay, VersionRecord};
use uuid::Uuid;

use crate::ledger::GameplayLedger;
use crate::repo::AuthorizationTokenRepository;

/// Result of `start()`: the persisted token and the gameplay it opened.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: AuthorizationToken,
    pub gameplay: Gameplay,
}

#[derive(Clone)]
pub struct TokenStore {
    ledger: GameplayLedger,
    tokens: Arc<dyn AuthorizationTokenRepository>,
}

impl TokenStore {
    pub fn new(ledger: GameplayLedger, tokens: Arc<dyn AuthorizationTokenRepository>) -> Self {
        Self { ledger, tokens }
    }

    pub fn ledger(&self) -> &GameplayLedger {
        &self.ledger
    }

    /// Open a session for `player_id` on `version` and mint its token.
    pub async fn start(
        &self,
        player_id: &str,
        tracking_code: &str,
        version: &VersionRecord,
    ) -> Result<IssuedSession> {
        let gameplay = self.ledger.start_session(player_id, &version.id).await?;
        let now = Utc::now();

        let token = AuthorizationToken {
            token: synthesize_token(&version.id, gameplay.id, gameplay.session_count),
            gameplay_id: gameplay.id,
            version_id: version.id.clone(),
            player_id: player_id.to_string(),
            activity_id: version.activity_id.clone(),
            session: gameplay.session_count,
            first_session_started: gameplay.first_started,
            session_started: now,
            last_accessed: now,
            advanced_from: None,
        };
        self.tokens.insert(token.clone()).await?;

        info!(
            tracking_code,
            player_id,
            gameplay_id = %gameplay.id,
            session = gameplay.session_count,
            "collector session started"
        );
        Ok(IssuedSession { token, gameplay })
    }

    /// Validate `token` and refresh `last_accessed`. `None` = unauthorized.
    pub async fn track(&self, token: &str) -> Result<Option<AuthorizationToken>> {
        let found = self.tokens.touch(token, Utc::now()).await?;
        if found.is_none() {
            debug!("unknown authorization token");
        }
        Ok(found)
    }

    /// Move `token` onto a new gameplay after a boundary marker.
    ///
    /// The first call per token mints (at most) one gameplay; every later call
    /// on the same token, concurrent or not, returns the token's current state.
    pub async fn advance(&self, token: &str) -> Result<AuthorizationToken> {
        let current = self.require(token).await?;
        if current.advanced_from.is_some() {
            return Ok(current);
        }

        let replacement = self
            .ledger
            .advance_to_new_gameplay(&current.player_id, &current.version_id, current.gameplay_id)
            .await?;

        match self
            .tokens
            .mark_advanced(token, current.gameplay_id, &replacement, Utc::now())
            .await?
        {
            Some(moved) => Ok(moved),
            // Lost the race to a concurrent advance on the same token.
            None => self.require(token).await,
        }
    }

    async fn require(&self, token: &str) -> Result<AuthorizationToken> {
        self.tokens
            .find(token)
            .await?
            .ok_or_else(|| anyhow!("authorization token disappeared during advance"))
    }
}

/// `versionId + gameplayId + randomSuffix + sessionCount`.
///
/// Uniqueness is probabilistic; this is a bearer credential, not a key.
fn synthesize_token(version_id: &str, gameplay_id: Uuid, session_count: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}{}{}",
        version_id,
        gameplay_id.simple(),
        &random[..12],
        session_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> VersionRecord {
        VersionRecord {
            id: "v1".to_string(),
            game_id: "g1".to_string(),
            tracking_code: "code".to_string(),
            activity_id: Some("act".to_string()),
        }
    }

    #[test]
    fn token_layout() {
        let gid = Uuid::new_v4();
        let t = synthesize_token("v1", gid, 7);
        assert!(t.starts_with(&format!("v1{}", gid.simple())));
        assert!(t.ends_with('7'));
        assert_eq!(t.len(), 2 + 32 + 12 + 1);
    }

    #[tokio::test]
    async fn start_persists_token_with_session_context() {
        let store = crate::in_memory();
        let issued = store.start("p1", "code", &version()).await.unwrap();

        let tok = store.track(&issued.token.token).await.unwrap().unwrap();
        assert_eq!(tok.gameplay_id, issued.gameplay.id);
        assert_eq!(tok.session, 1);
        assert_eq!(tok.activity_id.as_deref(), Some("act"));
        assert!(tok.last_accessed >= issued.token.last_accessed);
    }

    #[tokio::test]
    async fn track_unknown_token_is_none() {
        let store = crate::in_memory();
        assert!(store.track("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn advance_twice_mints_once() {
        let store = crate::in_memory();
        let issued = store.start("p1", "code", &version()).await.unwrap();
        let t = &issued.token.token;

        let a = store.advance(t).await.unwrap();
        let b = store.advance(t).await.unwrap();
        assert_ne!(a.gameplay_id, issued.gameplay.id);
        assert_eq!(a.gameplay_id, b.gameplay_id);
        assert_eq!(a.advanced_from, Some(issued.gameplay.id));
    }
}
