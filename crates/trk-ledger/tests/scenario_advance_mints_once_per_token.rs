//! At most one new gameplay per authorization token.
//!
//! GREEN when concurrent `advance()` calls on one token all observe the
//! same replacement gameplay and the store holds exactly two rows (the
//! original, retired, and its single replacement).

use std::sync::Arc;

use futures_util::future::join_all;
use trk_ledger::{GameplayLedger, MemoryGameplayRepository, MemoryTokenRepository, TokenStore};
use trk_schemas::VersionRecord;

fn version() -> VersionRecord {
    VersionRecord {
        id: "v1".to_string(),
        game_id: "g1".to_string(),
        tracking_code: "code-1".to_string(),
        activity_id: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_on_one_token_mint_once() {
    let gameplays = Arc::new(MemoryGameplayRepository::new());
    let store = TokenStore::new(
        GameplayLedger::new(gameplays.clone()),
        Arc::new(MemoryTokenRepository::new()),
    );
    let issued = store.start("player-1", "code-1", &version()).await.unwrap();
    let token = issued.token.token.clone();

    let results = join_all((0..16).map(|_| {
        let store = store.clone();
        let token = token.clone();
        tokio::spawn(async move { store.advance(&token).await })
    }))
    .await;

    let ids: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().gameplay_id)
        .collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_ne!(ids[0], issued.gameplay.id);
    assert_eq!(gameplays.len().await, 2);

    let old = store.ledger().find(issued.gameplay.id).await.unwrap().unwrap();
    assert!(!old.active, "original gameplay retired");
}

#[tokio::test]
async fn second_token_on_same_gameplay_joins_replacement() {
    let gameplays = Arc::new(MemoryGameplayRepository::new());
    let store = TokenStore::new(
        GameplayLedger::new(gameplays.clone()),
        Arc::new(MemoryTokenRepository::new()),
    );
    let a = store.start("player-1", "code-1", &version()).await.unwrap();
    let b = store.start("player-1", "code-1", &version()).await.unwrap();
    assert_eq!(a.gameplay.id, b.gameplay.id);

    let moved_a = store.advance(&a.token.token).await.unwrap();
    let moved_b = store.advance(&b.token.token).await.unwrap();

    assert_eq!(moved_a.gameplay_id, moved_b.gameplay_id);
    assert_eq!(gameplays.len().await, 2);
}
