//! Session counters under sequential and concurrent `start()`.
//!
//! GREEN when:
//! - N sequential starts for one (player, version) yield sessions 1..=N;
//! - N concurrent starts yield N distinct sessions covering 1..=N and a
//!   single gameplay row.

use std::sync::Arc;

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

#[tokio::test]
async fn sequential_starts_count_one_to_n() {
    let store = trk_ledger::in_memory();
    let v = version();

    for expected in 1..=10 {
        let issued = store.start("player-1", "code-1", &v).await.unwrap();
        assert_eq!(issued.gameplay.session_count, expected);
        assert_eq!(issued.token.session, expected);
        assert!(
            issued.token.token.ends_with(&expected.to_string()),
            "token carries the session count suffix"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_do_not_lose_updates() {
    let gameplays = Arc::new(MemoryGameplayRepository::new());
    let store = TokenStore::new(
        GameplayLedger::new(gameplays.clone()),
        Arc::new(MemoryTokenRepository::new()),
    );
    let v = version();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = store.clone();
            let v = v.clone();
            tokio::spawn(async move { store.start("player-1", "code-1", &v).await })
        })
        .collect();

    let mut sessions = Vec::new();
    for h in handles {
        sessions.push(h.await.unwrap().unwrap().gameplay.session_count);
    }
    sessions.sort();

    assert_eq!(sessions, (1..=32).collect::<Vec<i64>>());
    assert_eq!(gameplays.len().await, 1, "exactly one gameplay for the pair");
}
