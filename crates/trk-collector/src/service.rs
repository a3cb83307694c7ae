//! `start` and `track`: the two operations exposed to the HTTP layer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use trk_config::CollectorSection;
use trk_consumers::{Delivery, Dispatcher};
use trk_ledger::TokenStore;
use trk_schemas::{Actor, ActorAccount, Player, StartOutcome, TrackingTag, VersionRecord};
use trk_trace::{normalize_batch, NormalizeOptions};

use crate::auth::{parse_start_credentials, StartCredentials};
use crate::directory::{PlayerDirectory, VersionDirectory};
use crate::error::CollectorError;
use crate::splitter::{statements_from, BatchSplitter, BoundaryHandler};

pub const TRACK_SUCCESS: &str = "Success.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAck {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub home_page: String,
    pub boundary_verb: String,
    pub tracking_extension: String,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        CollectorOptions::from(&CollectorSection::default())
    }
}

impl From<&CollectorSection> for CollectorOptions {
    fn from(s: &CollectorSection) -> Self {
        Self {
            home_page: s.home_page.trim_end_matches('/').to_string(),
            boundary_verb: s.boundary_verb.clone(),
            tracking_extension: s.tracking_extension.clone(),
        }
    }
}

/// Composition of the ledger, directories, splitter, normalizer and fan-out.
pub struct Collector {
    tokens: TokenStore,
    players: Arc<dyn PlayerDirectory>,
    versions: Arc<dyn VersionDirectory>,
    dispatcher: Arc<Dispatcher>,
    splitter: BatchSplitter,
    normalize: NormalizeOptions,
    home_page: String,
}

impl Collector {
    pub fn new(
        tokens: TokenStore,
        players: Arc<dyn PlayerDirectory>,
        versions: Arc<dyn VersionDirectory>,
        dispatcher: Arc<Dispatcher>,
        options: CollectorOptions,
    ) -> Self {
        Self {
            tokens,
            players,
            versions,
            dispatcher,
            splitter: BatchSplitter::new(options.boundary_verb, options.tracking_extension.clone()),
            normalize: NormalizeOptions {
                tracking_extension: options.tracking_extension,
            },
            home_page: options.home_page,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    pub async fn start(
        &self,
        tracking_code: &str,
        authorization: Option<&str>,
        body: Option<&Value>,
    ) -> Result<StartOutcome, CollectorError> {
        let credentials = parse_start_credentials(authorization, body)?;

        let version = self
            .versions
            .find_by_tracking_code(tracking_code)
            .await?
            .ok_or_else(|| {
                CollectorError::NotFound(format!("Tracking code '{tracking_code}' not found"))
            })?;

        let player = self.resolve_player(credentials).await?;

        let issued = self.tokens.start(&player.id, tracking_code, &version).await?;

        Ok(StartOutcome {
            auth_token: issued.token.token.clone(),
            actor: Actor {
                name: player.display_name.clone(),
                account: ActorAccount {
                    home_page: self.home_page.clone(),
                    name: player.account_name().to_string(),
                },
            },
            object_id: self.object_id(&version),
            player_id: player.id.clone(),
            player_name: player.display_name,
            session: issued.token.session,
            first_session_started: issued.token.first_session_started,
            current_session_started: issued.token.session_started,
        })
    }

    async fn resolve_player(&self, credentials: StartCredentials) -> Result<Player, CollectorError> {
        let found = match credentials {
            StartCredentials::NewAnonymous => Some(self.players.create_anonymous().await?),
            StartCredentials::Anonymous(name) => self.players.find_anonymous(&name).await?,
            StartCredentials::Identified(username) => {
                self.players.find_identified(&username).await?
            }
        };
        found.ok_or_else(|| CollectorError::Unauthorized("Player not found".to_string()))
    }

    fn object_id(&self, version: &VersionRecord) -> String {
        format!("{}/games/{}/{}", self.home_page, version.game_id, version.id)
    }

    // -----------------------------------------------------------------------
    // track
    // -----------------------------------------------------------------------

    /// Validate the token, split, normalize and dispatch one batch.
    ///
    /// Gameplays minted by boundary markers are kept even when the batch is
    /// later rejected by the normalizer or a consumer.
    pub async fn track(&self, auth_token: &str, body: Value) -> Result<TrackAck, CollectorError> {
        let token = self
            .tokens
            .track(auth_token)
            .await?
            .ok_or_else(|| CollectorError::Unauthorized("Invalid authorization token".to_string()))?;

        let statements = statements_from(body)?;

        let boundary = TokenBoundary {
            tokens: &self.tokens,
            token: auth_token,
        };
        let split = self
            .splitter
            .split(statements, token.tracking_tag(), &boundary)
            .await?;

        let traces = normalize_batch(&split.statements, &self.normalize).map_err(|e| {
            debug!(gameplay_id = %token.gameplay_id, "normalization failed: {}", e.error);
            CollectorError::from(e)
        })?;

        let delivery = Delivery {
            player_id: &token.player_id,
            version_id: &token.version_id,
            gameplay_id: token.gameplay_id,
            raw: &split.statements,
            traces: &traces,
        };
        if let Err(e) = self.dispatcher.dispatch(delivery).await {
            warn!(
                gameplay_id = %token.gameplay_id,
                status = e.status,
                failures = e.failures,
                "batch rejected by consumer '{}'",
                e.consumer
            );
            return Err(e.into());
        }

        info!(
            gameplay_id = %token.gameplay_id,
            traces = traces.len(),
            boundaries = split.boundaries,
            "batch tracked"
        );
        Ok(TrackAck {
            message: TRACK_SUCCESS.to_string(),
        })
    }
}

/// Routes boundary markers to the token's one-shot advance.
struct TokenBoundary<'a> {
    tokens: &'a TokenStore,
    token: &'a str,
}

#[async_trait]
impl BoundaryHandler for TokenBoundary<'_> {
    async fn on_boundary(&self, _current: &TrackingTag) -> Result<TrackingTag, CollectorError> {
        let moved = self.tokens.advance(self.token).await?;
        Ok(moved.tracking_tag())
    }
}
