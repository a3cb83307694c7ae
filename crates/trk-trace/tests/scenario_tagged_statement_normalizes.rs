//! A statement carrying a tracking tag produces a fully populated trace.

use chrono::{DateTime, Utc};
use serde_json::json;
use trk_schemas::TrackingTag;
use trk_trace::{normalize, NormalizeOptions};
use uuid::Uuid;

fn tag() -> TrackingTag {
    TrackingTag {
        gameplay_id: Uuid::new_v4(),
        version_id: "v1".to_string(),
        session: 4,
        first_session_started: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        current_session_started: DateTime::<Utc>::from_timestamp(1_700_003_600, 0).unwrap(),
        activity_id: Some("activity-9".to_string()),
    }
}

#[test]
fn tracking_fields_come_from_the_tag() {
    let t = tag();
    let statement = json!({
        "actor": { "name": "QuietOtter" },
        "timestamp": "2024-03-01T10:00:00Z",
        "verb": { "id": "http://x/verbs/completed" },
        "object": {
            "id": "http://x/games/demo/level1",
            "definition": {
                "type": "https://w3id.org/xapi/seriousgames/activity-types/level",
                "extensions": { "tracking": serde_json::to_value(&t).unwrap() }
            }
        },
        "result": { "success": true }
    });

    let trace = normalize(&statement, &NormalizeOptions::default()).unwrap();
    assert_eq!(trace.event, "completed");
    assert_eq!(trace.tracking, Some(t.clone()));

    let wire = serde_json::to_value(&trace).unwrap();
    assert_eq!(wire["gameplayId"], json!(t.gameplay_id));
    assert_eq!(wire["session"], 4);
    assert_eq!(wire["activityId"], "activity-9");
    assert_eq!(wire["success"], true);
}

#[test]
fn custom_extension_key_is_honored() {
    let t = tag();
    let statement = json!({
        "actor": { "name": "QuietOtter" },
        "timestamp": "2024-03-01T10:00:00Z",
        "verb": { "id": "http://x/verbs/progressed" },
        "object": {
            "id": "http://x/games/demo",
            "definition": {
                "type": "serious-game",
                "extensions": { "urn:trk:tag": serde_json::to_value(&t).unwrap() }
            }
        }
    });

    let opts = NormalizeOptions {
        tracking_extension: "urn:trk:tag".to_string(),
    };
    let trace = normalize(&statement, &opts).unwrap();
    assert_eq!(trace.kind, "serious-game");
    assert_eq!(trace.tracking.map(|x| x.gameplay_id), Some(t.gameplay_id));

    // Default key does not see it.
    let plain = normalize(&statement, &NormalizeOptions::default()).unwrap();
    assert!(plain.tracking.is_none());
}
