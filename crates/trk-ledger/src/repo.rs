//! Repository traits for the two pieces of cross-request shared state.
//!
//! Every mutating method is a single atomic operation against the backing
//! store. Callers never read-modify-write across two calls.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trk_schemas::{AuthorizationToken, Gameplay};
use uuid::Uuid;

#[async_trait]
pub trait GameplayRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Gameplay>>;

    async fn find_active(&self, player_id: &str, version_id: &str) -> Result<Option<Gameplay>>;

    /// Store `candidate` as the active gameplay of its (player, version) pair
    /// unless one is already active. Returns whichever is active afterwards.
    async fn insert_if_absent(&self, candidate: Gameplay) -> Result<Gameplay>;

    /// Increment the active gameplay's `session_count`, or store `candidate`
    /// (with `session_count = 1`) when none is active.
    async fn increment_session(&self, candidate: Gameplay) -> Result<Gameplay>;

    /// Compare-and-swap on the active gameplay of `replacement`'s pair.
    ///
    /// If `expected` is still active it is retired and `replacement` becomes
    /// active. Otherwise nothing is created and the currently active gameplay
    /// is returned.
    async fn replace_active(&self, expected: Uuid, replacement: Gameplay) -> Result<Gameplay>;
}

#[async_trait]
pub trait AuthorizationTokenRepository: Send + Sync {
    /// Fails if the token value already exists.
    async fn insert(&self, token: AuthorizationToken) -> Result<()>;

    async fn find(&self, token: &str) -> Result<Option<AuthorizationToken>>;

    /// Set `last_accessed = now` and return the refreshed record.
    async fn touch(&self, token: &str, now: DateTime<Utc>) -> Result<Option<AuthorizationToken>>;

    /// Move the token onto `replacement`, only if it has never advanced and
    /// still points at `expected`. `None` when the condition did not hold.
    async fn mark_advanced(
        &self,
        token: &str,
        expected: Uuid,
        replacement: &Gameplay,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationToken>>;
}
