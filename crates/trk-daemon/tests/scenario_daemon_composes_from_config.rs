//! Scenario: `AppState::from_config` wires the consumers named in config.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use serde_json::json;
use trk_config::{load_layered_yaml_from_strings, StorageKind};
use trk_consumers::{verify_hash_chain, VerifyResult};
use trk_daemon::{routes, state::AppState};
use tower::ServiceExt;

#[tokio::test]
async fn trace_log_from_config_receives_tracked_batches() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("traces.jsonl");

    let yaml = format!(
        r#"
collector:
  home_page: "https://analytics.example.org/"
consumers:
  trace_log:
    path: "{}"
directory:
  versions:
    - id: "v9"
      game_id: "g9"
      tracking_code: "code-9"
  identified_players: ["teacher-1"]
"#,
        log_path.display()
    );
    let cfg = load_layered_yaml_from_strings(&[&yaml])
        .unwrap()
        .collector()
        .unwrap();
    assert_eq!(cfg.storage.kind, StorageKind::Memory);

    let secrets = cfg.resolve_secrets_with(|_| None).unwrap();
    let st = Arc::new(AppState::from_config(&cfg, &secrets).await.unwrap());
    assert_eq!(st.collector.dispatcher().len(), 2);

    let out = st
        .collector
        .start("code-9", Some("Bearer teacher-1"), None)
        .await
        .unwrap();
    assert_eq!(out.actor.account.home_page, "https://analytics.example.org");

    let body = json!([{
        "actor": { "name": "teacher-1" },
        "timestamp": "2024-03-01T10:00:00Z",
        "verb": { "id": "http://x/verbs/initialized" },
        "object": { "id": "http://x/o/game", "definition": { "type": "http://x/t/serious-game" } }
    }]);
    let req = Request::builder()
        .method("POST")
        .uri("/api/collector/track")
        .header("authorization", out.auth_token.as_str())
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let resp = routes::build_router(Arc::clone(&st)).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(
        verify_hash_chain(&log_path).unwrap(),
        VerifyResult::Valid { lines: 1 }
    );
}

#[tokio::test]
async fn postgres_without_url_fails_to_resolve() {
    let cfg = load_layered_yaml_from_strings(&["storage:\n  kind: postgres\n"])
        .unwrap()
        .collector()
        .unwrap();
    assert!(cfg.resolve_secrets_with(|_| None).is_err());
}
