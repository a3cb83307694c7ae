//! Statement batch splitter.
//!
//! Walks a batch in order and injects the current tracking tag into each
//! statement. A boundary marker (a statement whose verb id ends in the
//! configured boundary verb) is left untagged and moves every following
//! statement onto the gameplay returned by the [`BoundaryHandler`].
//!
//! Only the splitter decides tags: whatever the client put under the
//! tracking extension is overwritten, or removed on markers.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use trk_schemas::{RawStatement, TrackingTag};
use trk_trace::uri_tail;

use crate::error::CollectorError;

pub const STATEMENTS_NOT_ARRAY: &str = "Statements must be an array!";

/// Called once per boundary marker, in batch order.
#[async_trait]
pub trait BoundaryHandler: Send + Sync {
    /// Tag for statements after the marker.
    async fn on_boundary(&self, current: &TrackingTag) -> Result<TrackingTag, CollectorError>;
}

/// Accepts only a non-empty JSON array.
pub fn statements_from(body: Value) -> Result<Vec<RawStatement>, CollectorError> {
    match body {
        Value::Array(items) if !items.is_empty() => Ok(items),
        _ => Err(CollectorError::BadRequest(STATEMENTS_NOT_ARRAY.to_string())),
    }
}

#[derive(Debug)]
pub struct SplitBatch {
    /// Every input statement, in input order; markers included untagged.
    pub statements: Vec<RawStatement>,
    pub boundaries: usize,
}

#[derive(Debug, Clone)]
pub struct BatchSplitter {
    boundary_verb: String,
    tracking_extension: String,
}

impl BatchSplitter {
    pub fn new(boundary_verb: impl Into<String>, tracking_extension: impl Into<String>) -> Self {
        Self {
            boundary_verb: boundary_verb.into(),
            tracking_extension: tracking_extension.into(),
        }
    }

    pub fn is_boundary(&self, statement: &Value) -> bool {
        statement
            .pointer("/verb/id")
            .and_then(Value::as_str)
            .map(|id| uri_tail(id) == self.boundary_verb)
            .unwrap_or(false)
    }

    pub async fn split<H>(
        &self,
        statements: Vec<RawStatement>,
        initial: TrackingTag,
        handler: &H,
    ) -> Result<SplitBatch, CollectorError>
    where
        H: BoundaryHandler + ?Sized,
    {
        if statements.is_empty() {
            return Err(CollectorError::BadRequest(STATEMENTS_NOT_ARRAY.to_string()));
        }

        let mut current = initial;
        let mut boundaries = 0usize;
        let mut out = Vec::with_capacity(statements.len());

        for mut statement in statements {
            if self.is_boundary(&statement) {
                current = handler.on_boundary(&current).await?;
                boundaries += 1;
                debug!(gameplay_id = %current.gameplay_id, "boundary marker in batch");
                self.untag(&mut statement);
            } else {
                self.tag(&mut statement, &current)?;
            }
            out.push(statement);
        }

        Ok(SplitBatch {
            statements: out,
            boundaries,
        })
    }

    /// Writes the tag into `object.definition.extensions`. Statements without
    /// an object definition, or whose extensions are not an object, are left
    /// alone; the normalizer rejects them with the statement echoed.
    fn tag(&self, statement: &mut Value, tag: &TrackingTag) -> Result<(), CollectorError> {
        let Some(definition) = statement
            .pointer_mut("/object/definition")
            .and_then(Value::as_object_mut)
        else {
            return Ok(());
        };

        let extensions = definition
            .entry("extensions")
            .or_insert_with(|| Value::Object(Map::new()));
        if extensions.is_null() {
            *extensions = Value::Object(Map::new());
        }
        let Some(ext) = extensions.as_object_mut() else {
            return Ok(());
        };

        let value = serde_json::to_value(tag)
            .map_err(|e| CollectorError::Internal(format!("serialize tracking tag: {e}")))?;
        ext.insert(self.tracking_extension.clone(), value);
        Ok(())
    }

    /// Drops any client-supplied tag from a marker.
    fn untag(&self, statement: &mut Value) {
        if let Some(ext) = statement
            .pointer_mut("/object/definition/extensions")
            .and_then(Value::as_object_mut)
        {
            ext.remove(&self.tracking_extension);
        }
    }
}
