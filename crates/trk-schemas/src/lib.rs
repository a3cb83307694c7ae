//! Shared data model for the telemetry collector.
//!
//! Every type here is plain data (`Serialize + Deserialize`). No storage,
//! no validation and no I/O live in this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A raw xAPI-profile statement exactly as submitted by a game client.
pub type RawStatement = Value;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Anonymous,
    Identified,
}

/// A player as resolved by the external player directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Human-facing name. Anonymous players get a generated one.
    pub display_name: String,
    pub kind: PlayerKind,
}

impl Player {
    /// Account name reported back to clients in the xAPI actor.
    pub fn account_name(&self) -> &str {
        match self.kind {
            PlayerKind::Anonymous => "Anonymous",
            PlayerKind::Identified => &self.display_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Content version a tracking code points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub game_id: String,
    pub tracking_code: String,
    /// Set when the version is bound to a class activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Gameplays
// ---------------------------------------------------------------------------

/// One play-through of a version by a player.
///
/// `session_count` never decreases. At most one gameplay per
/// (player, version) is `active`; advancing retires the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gameplay {
    pub id: Uuid,
    pub player_id: String,
    pub version_id: String,
    pub session_count: i64,
    pub first_started: DateTime<Utc>,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Authorization tokens
// ---------------------------------------------------------------------------

/// Short-lived bearer credential issued by `start` and presented on `track`.
///
/// Besides the identity fields it snapshots the session context that every
/// statement submitted under it gets tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    pub token: String,
    pub gameplay_id: Uuid,
    pub version_id: String,
    pub player_id: String,
    pub activity_id: Option<String>,
    /// Session number this token was issued for.
    pub session: i64,
    pub first_session_started: DateTime<Utc>,
    pub session_started: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Gameplay this token pointed at before a boundary marker moved it.
    /// `Some` means the token already minted its one replacement gameplay.
    pub advanced_from: Option<Uuid>,
}

impl AuthorizationToken {
    /// Tag applied to statements processed under this token.
    pub fn tracking_tag(&self) -> TrackingTag {
        TrackingTag {
            gameplay_id: self.gameplay_id,
            version_id: self.version_id.clone(),
            session: self.session,
            first_session_started: self.first_session_started,
            current_session_started: self.session_started,
            activity_id: self.activity_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking tag + traces
// ---------------------------------------------------------------------------

/// Gameplay context injected into each statement by the batch splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingTag {
    pub gameplay_id: Uuid,
    pub version_id: String,
    pub session: i64,
    pub first_session_started: DateTime<Utc>,
    pub current_session_started: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

/// Backend-agnostic representation of one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    /// Actor name.
    pub name: String,
    /// URI tail of `verb.id`.
    pub event: String,
    /// URI tail of `object.id`.
    pub target: String,
    /// URI tail of `object.definition.type`.
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default)]
    pub ext: Map<String, Value>,
    /// Absent only for boundary markers, which the splitter leaves untagged.
    #[serde(flatten)]
    pub tracking: Option<TrackingTag>,
    pub correlation_id: Uuid,
}

// ---------------------------------------------------------------------------
// start() result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorAccount {
    pub home_page: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub account: ActorAccount,
}

/// Everything a client needs to begin submitting statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub auth_token: String,
    pub actor: Actor,
    pub object_id: String,
    pub player_id: String,
    pub player_name: String,
    pub session: i64,
    pub first_session_started: DateTime<Utc>,
    pub current_session_started: DateTime<Utc>,
}
