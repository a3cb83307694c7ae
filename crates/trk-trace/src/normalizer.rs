//! Statement normalization.
//!
//! Converts one raw xAPI-profile statement into a [`Trace`] or the first
//! structural problem found. Checks run in a fixed order so the same bad
//! statement always reports the same error:
//!
//! 1. actor, actor.name, timestamp
//! 2. verb, verb.id (no trailing `/`)
//! 3. object, object.id (no trailing `/`)
//! 4. object.definition, definition.type (no trailing `/`),
//!    definition.extensions (an object when present)
//! 5. result.score.raw (when a score is present), result.extensions (an
//!    object when present) and its keys
//!
//! A field counts as present when it exists, is not `null` and, for
//! strings, is not empty.

use std::fmt;

use serde_json::{Map, Value};
use trk_schemas::{RawStatement, Trace, TrackingTag};
use uuid::Uuid;

use crate::uri::{ends_with_separator, uri_tail};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What is structurally wrong with a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    ActorMissing,
    ActorNameMissing,
    TimestampMissing,
    VerbMissing,
    VerbIdMissing,
    VerbIdTrailingSlash,
    ObjectMissing,
    ObjectIdMissing,
    ObjectIdTrailingSlash,
    DefinitionMissing,
    DefinitionTypeMissing,
    DefinitionTypeTrailingSlash,
    DefinitionExtensionsNotObject,
    ScoreRawMissing,
    ResultExtensionsNotObject,
    ExtensionKeyTrailingSlash { key: String },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::ActorMissing => write!(f, "Actor not present"),
            StructuralError::ActorNameMissing => write!(f, "Actor name not present"),
            StructuralError::TimestampMissing => write!(f, "Timestamp not present"),
            StructuralError::VerbMissing => write!(f, "Verb not present"),
            StructuralError::VerbIdMissing => write!(f, "Verb ID not present"),
            StructuralError::VerbIdTrailingSlash => {
                write!(f, "Verb ID should not end with a slash")
            }
            StructuralError::ObjectMissing => write!(f, "Object not present"),
            StructuralError::ObjectIdMissing => write!(f, "Object ID not present"),
            StructuralError::ObjectIdTrailingSlash => {
                write!(f, "Object ID should not end with a slash")
            }
            StructuralError::DefinitionMissing => write!(f, "Object definition not present"),
            StructuralError::DefinitionTypeMissing => {
                write!(f, "Object definition type not present")
            }
            StructuralError::DefinitionTypeTrailingSlash => {
                write!(f, "Object definition type should not end with a slash")
            }
            StructuralError::DefinitionExtensionsNotObject => {
                write!(f, "Object definition extensions should be an object")
            }
            StructuralError::ScoreRawMissing => write!(f, "Result score raw not present"),
            StructuralError::ResultExtensionsNotObject => {
                write!(f, "Result extensions should be an object")
            }
            StructuralError::ExtensionKeyTrailingSlash { key } => {
                write!(f, "Result extension key '{key}' should not end with a slash")
            }
        }
    }
}

impl std::error::Error for StructuralError {}

/// A [`StructuralError`] together with the offending statement.
///
/// Displays as `<error> for statement, <statement json>`; this exact text is
/// what callers receive in a 400 response.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementError {
    pub error: StructuralError,
    pub statement: RawStatement,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for statement, {}", self.error, self.statement)
    }
}

impl std::error::Error for StatementError {}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Key under `object.definition.extensions` holding the tracking tag.
    pub tracking_extension: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            tracking_extension: "tracking".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Non-null, non-empty field as text. Non-string scalars use their JSON text.
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn present(v: Option<&Value>) -> Option<&Value> {
    v.filter(|x| !x.is_null())
}

/// IRI field that must be present and must not end with `/`.
fn iri(
    v: Option<&Value>,
    missing: StructuralError,
    trailing: StructuralError,
) -> Result<String, StructuralError> {
    let s = text(v).ok_or(missing)?;
    if ends_with_separator(&s) {
        return Err(trailing);
    }
    Ok(s)
}

fn check(statement: &RawStatement, opts: &NormalizeOptions) -> Result<Trace, StructuralError> {
    let actor = present(statement.get("actor")).ok_or(StructuralError::ActorMissing)?;
    let name = text(actor.get("name")).ok_or(StructuralError::ActorNameMissing)?;
    let timestamp = text(statement.get("timestamp")).ok_or(StructuralError::TimestampMissing)?;

    let verb = present(statement.get("verb")).ok_or(StructuralError::VerbMissing)?;
    let verb_id = iri(
        verb.get("id"),
        StructuralError::VerbIdMissing,
        StructuralError::VerbIdTrailingSlash,
    )?;

    let object = present(statement.get("object")).ok_or(StructuralError::ObjectMissing)?;
    let object_id = iri(
        object.get("id"),
        StructuralError::ObjectIdMissing,
        StructuralError::ObjectIdTrailingSlash,
    )?;

    let definition =
        present(object.get("definition")).ok_or(StructuralError::DefinitionMissing)?;
    let def_type = iri(
        definition.get("type"),
        StructuralError::DefinitionTypeMissing,
        StructuralError::DefinitionTypeTrailingSlash,
    )?;

    let tracking = match present(definition.get("extensions")) {
        None => None,
        Some(Value::Object(ext)) => ext
            .get(&opts.tracking_extension)
            .and_then(|tag| serde_json::from_value::<TrackingTag>(tag.clone()).ok()),
        Some(_) => return Err(StructuralError::DefinitionExtensionsNotObject),
    };

    let mut trace = Trace {
        name,
        event: uri_tail(&verb_id).to_string(),
        target: uri_tail(&object_id).to_string(),
        kind: uri_tail(&def_type).to_string(),
        timestamp,
        success: None,
        completion: None,
        score: None,
        response: None,
        ext: Map::new(),
        tracking,
        correlation_id: Uuid::new_v4(),
    };

    if let Some(result) = present(statement.get("result")) {
        apply_result(result, &mut trace)?;
    }

    Ok(trace)
}

fn apply_result(result: &Value, trace: &mut Trace) -> Result<(), StructuralError> {
    if let Some(score) = present(result.get("score")) {
        let raw = present(score.get("raw")).ok_or(StructuralError::ScoreRawMissing)?;
        trace.score = Some(raw.clone());
    }

    trace.success = present(result.get("success")).cloned();
    trace.completion = present(result.get("completion")).cloned();
    trace.response = present(result.get("response")).cloned();

    let extensions = match present(result.get("extensions")) {
        None => return Ok(()),
        Some(Value::Object(extensions)) => extensions,
        Some(_) => return Err(StructuralError::ResultExtensionsNotObject),
    };
    for (key, value) in extensions {
        if ends_with_separator(key) {
            return Err(StructuralError::ExtensionKeyTrailingSlash { key: key.clone() });
        }
        trace.ext.insert(uri_tail(key).to_string(), value.clone());
    }

    Ok(())
}

/// Normalize one statement.
pub fn normalize(
    statement: &RawStatement,
    opts: &NormalizeOptions,
) -> Result<Trace, StatementError> {
    check(statement, opts).map_err(|error| StatementError {
        error,
        statement: statement.clone(),
    })
}

/// Normalize a whole batch, stopping at the first bad statement.
pub fn normalize_batch(
    statements: &[RawStatement],
    opts: &NormalizeOptions,
) -> Result<Vec<Trace>, StatementError> {
    statements.iter().map(|s| normalize(s, opts)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "actor": { "name": "player-1" },
            "timestamp": "2024-03-01T10:00:00Z",
            "verb": { "id": "http://x/verbs/completed" },
            "object": {
                "id": "http://x/games/demo/level1",
                "definition": { "type": "https://w3id.org/xapi/seriousgames/activity-types/level" }
            }
        })
    }

    fn err_of(v: Value) -> StructuralError {
        normalize(&v, &NormalizeOptions::default()).unwrap_err().error
    }

    #[test]
    fn minimal_statement_normalizes() {
        let t = normalize(&base(), &NormalizeOptions::default()).unwrap();
        assert_eq!(t.name, "player-1");
        assert_eq!(t.event, "completed");
        assert_eq!(t.target, "level1");
        assert_eq!(t.kind, "level");
        assert_eq!(t.timestamp, "2024-03-01T10:00:00Z");
        assert!(t.tracking.is_none());
        assert!(t.ext.is_empty());
    }

    #[test]
    fn checks_run_in_order() {
        // Everything missing: actor is reported first.
        assert_eq!(err_of(json!({})), StructuralError::ActorMissing);

        let mut v = base();
        v["actor"] = json!({});
        v["verb"] = Value::Null;
        assert_eq!(err_of(v), StructuralError::ActorNameMissing);

        let mut v = base();
        v.as_object_mut().unwrap().remove("timestamp");
        v["object"] = Value::Null;
        assert_eq!(err_of(v), StructuralError::TimestampMissing);

        let mut v = base();
        v.as_object_mut().unwrap().remove("verb");
        assert_eq!(err_of(v), StructuralError::VerbMissing);

        let mut v = base();
        v["verb"] = json!({ "display": {} });
        assert_eq!(err_of(v), StructuralError::VerbIdMissing);

        let mut v = base();
        v["verb"]["id"] = json!("http://x/verbs/");
        assert_eq!(err_of(v), StructuralError::VerbIdTrailingSlash);

        let mut v = base();
        v.as_object_mut().unwrap().remove("object");
        assert_eq!(err_of(v), StructuralError::ObjectMissing);

        let mut v = base();
        v["object"].as_object_mut().unwrap().remove("id");
        assert_eq!(err_of(v), StructuralError::ObjectIdMissing);

        let mut v = base();
        v["object"]["id"] = json!("http://x/games/demo/");
        assert_eq!(err_of(v), StructuralError::ObjectIdTrailingSlash);

        let mut v = base();
        v["object"].as_object_mut().unwrap().remove("definition");
        assert_eq!(err_of(v), StructuralError::DefinitionMissing);

        let mut v = base();
        v["object"]["definition"] = json!({});
        assert_eq!(err_of(v), StructuralError::DefinitionTypeMissing);

        let mut v = base();
        v["object"]["definition"]["type"] = json!("http://x/types/");
        assert_eq!(err_of(v), StructuralError::DefinitionTypeTrailingSlash);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut v = base();
        v["actor"]["name"] = json!("");
        assert_eq!(err_of(v), StructuralError::ActorNameMissing);
    }

    #[test]
    fn messages_are_distinct() {
        let all = [
            StructuralError::ActorMissing,
            StructuralError::ActorNameMissing,
            StructuralError::TimestampMissing,
            StructuralError::VerbMissing,
            StructuralError::VerbIdMissing,
            StructuralError::VerbIdTrailingSlash,
            StructuralError::ObjectMissing,
            StructuralError::ObjectIdMissing,
            StructuralError::ObjectIdTrailingSlash,
            StructuralError::DefinitionMissing,
            StructuralError::DefinitionTypeMissing,
            StructuralError::DefinitionTypeTrailingSlash,
            StructuralError::DefinitionExtensionsNotObject,
            StructuralError::ScoreRawMissing,
            StructuralError::ResultExtensionsNotObject,
        ];
        let mut msgs: Vec<String> = all.iter().map(|e| e.to_string()).collect();
        msgs.sort();
        msgs.dedup();
        assert_eq!(msgs.len(), all.len());
    }

    #[test]
    fn score_requires_raw_and_zero_is_present() {
        let mut v = base();
        v["result"] = json!({ "score": { "min": 0 } });
        assert_eq!(err_of(v), StructuralError::ScoreRawMissing);

        let mut v = base();
        v["result"] = json!({ "score": { "raw": 0 } });
        let t = normalize(&v, &NormalizeOptions::default()).unwrap();
        assert_eq!(t.score, Some(json!(0)));
    }

    #[test]
    fn result_fields_copied_verbatim() {
        let mut v = base();
        v["result"] = json!({
            "success": false,
            "completion": true,
            "response": "B",
            "score": { "raw": 42.5, "max": 100 }
        });
        let t = normalize(&v, &NormalizeOptions::default()).unwrap();
        assert_eq!(t.success, Some(json!(false)));
        assert_eq!(t.completion, Some(json!(true)));
        assert_eq!(t.response, Some(json!("B")));
        assert_eq!(t.score, Some(json!(42.5)));
    }

    #[test]
    fn extensions_flatten_to_uri_tails() {
        let mut v = base();
        v["result"] = json!({
            "extensions": {
                "https://w3id.org/xapi/seriousgames/extensions/progress": 0.5,
                "health": 3
            }
        });
        let t = normalize(&v, &NormalizeOptions::default()).unwrap();
        assert_eq!(t.ext.get("progress"), Some(&json!(0.5)));
        assert_eq!(t.ext.get("health"), Some(&json!(3)));
    }

    #[test]
    fn extension_key_with_trailing_slash_rejected() {
        let mut v = base();
        v["result"] = json!({ "extensions": { "http://x/ext/": 1 } });
        assert!(matches!(
            err_of(v),
            StructuralError::ExtensionKeyTrailingSlash { .. }
        ));
    }

    #[test]
    fn non_object_result_extensions_rejected() {
        for bad in [json!([1, 2]), json!("progress"), json!(3)] {
            let mut v = base();
            v["result"] = json!({ "extensions": bad });
            assert_eq!(err_of(v), StructuralError::ResultExtensionsNotObject);
        }

        let mut v = base();
        v["result"] = json!({ "extensions": null, "success": true });
        let t = normalize(&v, &NormalizeOptions::default()).unwrap();
        assert_eq!(t.success, Some(json!(true)));
        assert!(t.ext.is_empty());
    }

    #[test]
    fn non_object_definition_extensions_rejected_with_echo() {
        let mut v = base();
        v["object"]["definition"]["extensions"] = json!([1, 2]);
        let e = normalize(&v, &NormalizeOptions::default()).unwrap_err();
        assert_eq!(e.error, StructuralError::DefinitionExtensionsNotObject);
        assert!(e
            .to_string()
            .starts_with("Object definition extensions should be an object for statement, "));
    }

    #[test]
    fn error_text_echoes_statement() {
        let mut v = base();
        v["object"]["id"] = json!("http://x/games/demo/");
        let e = normalize(&v, &NormalizeOptions::default()).unwrap_err();
        let msg = e.to_string();
        assert!(msg.starts_with("Object ID should not end with a slash for statement, "));
        assert!(msg.contains("http://x/games/demo/"));
    }

    #[test]
    fn correlation_ids_are_fresh() {
        let a = normalize(&base(), &NormalizeOptions::default()).unwrap();
        let b = normalize(&base(), &NormalizeOptions::default()).unwrap();
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn batch_stops_at_first_error() {
        let mut bad = base();
        bad.as_object_mut().unwrap().remove("verb");
        let err = normalize_batch(&[base(), bad, json!({})], &NormalizeOptions::default())
            .unwrap_err();
        assert_eq!(err.error, StructuralError::VerbMissing);
    }
}
