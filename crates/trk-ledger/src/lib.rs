//! trk-ledger
//!
//! Gameplay bookkeeping and authorization tokens.
//!
//! - [`repo`]: the storage seam (one repository trait per entity).
//! - [`memory`] / [`pg`]: in-process and Postgres implementations.
//! - [`ledger`]: gameplay lifecycle (ensure / start session / advance).
//! - [`tokens`]: token minting, validation and per-token advance guard.

pub mod ledger;
pub mod memory;
pub mod pg;
pub mod repo;
pub mod tokens;

pub use ledger::GameplayLedger;
pub use memory::{MemoryGameplayRepository, MemoryTokenRepository};
pub use pg::{PgGameplayRepository, PgTokenRepository};
pub use repo::{AuthorizationTokenRepository, GameplayRepository};
pub use tokens::{IssuedSession, TokenStore};

use std::sync::Arc;

/// Ledger + token store over fresh in-memory repositories.
pub fn in_memory() -> TokenStore {
    let ledger = GameplayLedger::new(Arc::new(MemoryGameplayRepository::new()));
    TokenStore::new(ledger, Arc::new(MemoryTokenRepository::new()))
}
