//! Postgres-backed repositories.
//!
//! Atomicity comes from single statements (`insert .. on conflict .. do
//! update`, conditional `update .. returning`) or, for `replace_active`, one
//! short transaction whose first statement row-locks the expected gameplay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};
use trk_schemas::{AuthorizationToken, Gameplay};
use uuid::Uuid;

use crate::repo::{AuthorizationTokenRepository, GameplayRepository};

pub const ENV_DB_URL: &str = "TRK_DATABASE_URL";

/// Connect to Postgres at `url`.
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Connect using TRK_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Run embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

const GAMEPLAY_COLUMNS: &str =
    "gameplay_id, player_id, version_id, session_count, first_started, active";

const TOKEN_COLUMNS: &str = "token, gameplay_id, version_id, player_id, activity_id, session, \
     first_session_started, session_started, last_accessed, advanced_from";

fn gameplay_from_row(row: &PgRow) -> Result<Gameplay> {
    Ok(Gameplay {
        id: row.try_get("gameplay_id")?,
        player_id: row.try_get("player_id")?,
        version_id: row.try_get("version_id")?,
        session_count: row.try_get("session_count")?,
        first_started: row.try_get("first_started")?,
        active: row.try_get("active")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<AuthorizationToken> {
    Ok(AuthorizationToken {
        token: row.try_get("token")?,
        gameplay_id: row.try_get("gameplay_id")?,
        version_id: row.try_get("version_id")?,
        player_id: row.try_get("player_id")?,
        activity_id: row.try_get("activity_id")?,
        session: row.try_get("session")?,
        first_session_started: row.try_get("first_session_started")?,
        session_started: row.try_get("session_started")?,
        last_accessed: row.try_get("last_accessed")?,
        advanced_from: row.try_get("advanced_from")?,
    })
}

#[derive(Clone)]
pub struct PgGameplayRepository {
    pool: PgPool,
}

impl PgGameplayRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameplayRepository for PgGameplayRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Gameplay>> {
        let row = sqlx::query(&format!(
            "select {GAMEPLAY_COLUMNS} from gameplays where gameplay_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find gameplay by id failed")?;

        row.as_ref().map(gameplay_from_row).transpose()
    }

    async fn find_active(&self, player_id: &str, version_id: &str) -> Result<Option<Gameplay>> {
        let row = sqlx::query(&format!(
            "select {GAMEPLAY_COLUMNS} from gameplays \
             where player_id = $1 and version_id = $2 and active"
        ))
        .bind(player_id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await
        .context("find active gameplay failed")?;

        row.as_ref().map(gameplay_from_row).transpose()
    }

    async fn insert_if_absent(&self, candidate: Gameplay) -> Result<Gameplay> {
        // The no-op update makes `returning` yield the existing row on conflict.
        let row = sqlx::query(&format!(
            r#"
            insert into gameplays ({GAMEPLAY_COLUMNS})
            values ($1, $2, $3, $4, $5, true)
            on conflict (player_id, version_id) where active
            do update set session_count = gameplays.session_count
            returning {GAMEPLAY_COLUMNS}
            "#
        ))
        .bind(candidate.id)
        .bind(&candidate.player_id)
        .bind(&candidate.version_id)
        .bind(candidate.session_count)
        .bind(candidate.first_started)
        .fetch_one(&self.pool)
        .await
        .context("insert_if_absent gameplay failed")?;

        gameplay_from_row(&row)
    }

    async fn increment_session(&self, candidate: Gameplay) -> Result<Gameplay> {
        let row = sqlx::query(&format!(
            r#"
            insert into gameplays ({GAMEPLAY_COLUMNS})
            values ($1, $2, $3, 1, $4, true)
            on conflict (player_id, version_id) where active
            do update set session_count = gameplays.session_count + 1
            returning {GAMEPLAY_COLUMNS}
            "#
        ))
        .bind(candidate.id)
        .bind(&candidate.player_id)
        .bind(&candidate.version_id)
        .bind(candidate.first_started)
        .fetch_one(&self.pool)
        .await
        .context("increment_session failed")?;

        gameplay_from_row(&row)
    }

    async fn replace_active(&self, expected: Uuid, replacement: Gameplay) -> Result<Gameplay> {
        let mut tx = self.pool.begin().await.context("begin replace_active")?;

        let retired = sqlx::query(
            r#"
            update gameplays
            set active = false
            where gameplay_id = $1 and active
            returning gameplay_id
            "#,
        )
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await
        .context("retire gameplay failed")?;

        let current = if retired.is_none() {
            let row = sqlx::query(&format!(
                "select {GAMEPLAY_COLUMNS} from gameplays \
                 where player_id = $1 and version_id = $2 and active"
            ))
            .bind(&replacement.player_id)
            .bind(&replacement.version_id)
            .fetch_optional(&mut *tx)
            .await
            .context("select active gameplay failed")?;
            row.as_ref().map(gameplay_from_row).transpose()?
        } else {
            None
        };

        let out = match current {
            Some(existing) => existing,
            None => {
                let row = sqlx::query(&format!(
                    r#"
                    insert into gameplays ({GAMEPLAY_COLUMNS})
                    values ($1, $2, $3, $4, $5, true)
                    returning {GAMEPLAY_COLUMNS}
                    "#
                ))
                .bind(replacement.id)
                .bind(&replacement.player_id)
                .bind(&replacement.version_id)
                .bind(replacement.session_count)
                .bind(replacement.first_started)
                .fetch_one(&mut *tx)
                .await
                .context("insert replacement gameplay failed")?;
                gameplay_from_row(&row)?
            }
        };

        tx.commit().await.context("commit replace_active")?;
        Ok(out)
    }
}

#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationTokenRepository for PgTokenRepository {
    async fn insert(&self, token: AuthorizationToken) -> Result<()> {
        sqlx::query(&format!(
            r#"
            insert into auth_tokens ({TOKEN_COLUMNS})
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#
        ))
        .bind(&token.token)
        .bind(token.gameplay_id)
        .bind(&token.version_id)
        .bind(&token.player_id)
        .bind(&token.activity_id)
        .bind(token.session)
        .bind(token.first_session_started)
        .bind(token.session_started)
        .bind(token.last_accessed)
        .bind(token.advanced_from)
        .execute(&self.pool)
        .await
        .context("insert auth token failed")?;
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<AuthorizationToken>> {
        let row = sqlx::query(&format!(
            "select {TOKEN_COLUMNS} from auth_tokens where token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("find auth token failed")?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn touch(&self, token: &str, now: DateTime<Utc>) -> Result<Option<AuthorizationToken>> {
        let row = sqlx::query(&format!(
            r#"
            update auth_tokens
            set last_accessed = $2
            where token = $1
            returning {TOKEN_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("touch auth token failed")?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn mark_advanced(
        &self,
        token: &str,
        expected: Uuid,
        replacement: &Gameplay,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationToken>> {
        let row = sqlx::query(&format!(
            r#"
            update auth_tokens
            set gameplay_id = $3,
                session = $4,
                first_session_started = $5,
                session_started = $6,
                advanced_from = $2
            where token = $1
              and advanced_from is null
              and gameplay_id = $2
            returning {TOKEN_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(expected)
        .bind(replacement.id)
        .bind(replacement.session_count)
        .bind(replacement.first_started)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("mark_advanced failed")?;

        row.as_ref().map(token_from_row).transpose()
    }
}
