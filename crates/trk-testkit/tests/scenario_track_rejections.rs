//! Scenario: `track()` rejections happen before any consumer sees the batch.

use std::sync::Arc;

use serde_json::json;
use trk_testkit::{statement, RecordingConsumer, TestCollector};

#[tokio::test]
async fn unknown_token_is_unauthorized_and_invokes_no_consumer() {
    let tc = TestCollector::new();
    let sink = Arc::new(RecordingConsumer::new("sink"));
    tc.add_consumer(sink.clone());

    let e = tc
        .collector
        .track("not-a-token", json!([statement("initialized")]))
        .await
        .unwrap_err();
    assert_eq!(e.status(), 401);

    // Token is checked before the body.
    let e = tc.collector.track("not-a-token", json!([])).await.unwrap_err();
    assert_eq!(e.status(), 401);

    assert!(sink.received().await.is_empty());
}

#[tokio::test]
async fn empty_or_non_array_body_is_bad_request() {
    let tc = TestCollector::new();
    let sink = Arc::new(RecordingConsumer::new("sink"));
    tc.add_consumer(sink.clone());
    let s = tc.start_anonymous().await.unwrap();

    for body in [json!([]), json!({ "verb": {} }), json!(null)] {
        let e = tc.collector.track(&s.auth_token, body).await.unwrap_err();
        assert_eq!(e.status(), 400);
        assert_eq!(e.message(), "Statements must be an array!");
    }
    assert!(sink.received().await.is_empty());
}

#[tokio::test]
async fn verb_tail_becomes_event() {
    let tc = TestCollector::new();
    let sink = Arc::new(RecordingConsumer::new("sink"));
    tc.add_consumer(sink.clone());
    let s = tc.start_anonymous().await.unwrap();

    tc.collector
        .track(&s.auth_token, json!([statement("completed")]))
        .await
        .unwrap();
    let t = &sink.traces().await[0];
    assert_eq!(t.event, "completed");
    assert_eq!(t.target, "level1");
    assert_eq!(t.kind, "level");
}

#[tokio::test]
async fn structural_error_echoes_statement_and_aborts_batch() {
    let tc = TestCollector::new();
    let sink = Arc::new(RecordingConsumer::new("sink"));
    tc.add_consumer(sink.clone());
    let s = tc.start_anonymous().await.unwrap();

    let mut bad = statement("completed");
    bad["object"]["id"] = json!("http://example.org/games/demo/");

    let e = tc
        .collector
        .track(&s.auth_token, json!([statement("initialized"), bad]))
        .await
        .unwrap_err();
    assert_eq!(e.status(), 400);
    assert!(e.message().contains("Object ID should not end with a slash"), "{}", e.message());
    assert!(e.message().contains("for statement, "));
    assert!(e.message().contains("http://example.org/games/demo/"));

    assert!(sink.received().await.is_empty());
}

#[tokio::test]
async fn missing_actor_is_reported() {
    let tc = TestCollector::new();
    let s = tc.start_anonymous().await.unwrap();

    let mut bad = statement("completed");
    bad.as_object_mut().unwrap().remove("actor");
    let e = tc
        .collector
        .track(&s.auth_token, json!([bad]))
        .await
        .unwrap_err();
    assert!(e.message().starts_with("Actor not present for statement, "));
}

#[tokio::test]
async fn non_object_definition_extensions_echo_the_statement() {
    let tc = TestCollector::new();
    let sink = Arc::new(RecordingConsumer::new("sink"));
    tc.add_consumer(sink.clone());
    let s = tc.start_anonymous().await.unwrap();

    let mut odd = statement("progressed");
    odd["object"]["definition"]["extensions"] = json!([1, 2]);
    let e = tc
        .collector
        .track(&s.auth_token, json!([statement("initialized"), odd]))
        .await
        .unwrap_err();

    assert_eq!(e.status(), 400);
    assert!(
        e.message()
            .starts_with("Object definition extensions should be an object for statement, "),
        "{}",
        e.message()
    );
    assert!(e.message().contains("[1,2]"));
    assert!(sink.received().await.is_empty());
}
