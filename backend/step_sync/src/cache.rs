//! Durable cache of the last known `StepState`, so a restarted client can show
//! the right step before the backend answers.
//!
//! One row under [`CACHE_KEY`] holds the JSON document; it is read and
//! rewritten whole. Every operation is best-effort: failures are logged and
//! swallowed, and an unreadable entry loads as "absent".

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::state::StepState;

/// Fixed key of the cached state row.
pub const CACHE_KEY: &str = "funding_step_state";

/// Open (creating if needed) the SQLite cache database and run migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // Each in-memory connection is its own database; keep exactly one alive.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Step cache migrations applied");
    Ok(pool)
}

#[derive(Debug, Error)]
enum CacheError {
    #[error("cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("cached state is inconsistent: {0}")]
    Inconsistent(&'static str),

    #[error("cache storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    pool: SqlitePool,
}

impl LocalCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Overwrite the cached entry with `state`.
    pub async fn save(&self, state: &StepState) {
        if let Err(e) = self.write(state).await {
            warn!("Failed to persist step state: {e}");
        }
    }

    /// Last saved state, or `None` when missing or unreadable.
    pub async fn load(&self) -> Option<StepState> {
        match self.read().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring cached step state: {e}");
                None
            }
        }
    }

    /// Remove the cached entry (logout / reset).
    pub async fn clear(&self) {
        let result = sqlx::query("DELETE FROM step_cache WHERE key = ?1")
            .bind(CACHE_KEY)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!("Failed to clear cached step state: {e}");
        }
    }

    async fn write(&self, state: &StepState) -> std::result::Result<(), CacheError> {
        let value = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO step_cache (key, value, updated_at)
            VALUES (?1, ?2, strftime('%s', 'now'))
            ON CONFLICT(key) DO UPDATE SET
                value      = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(CACHE_KEY)
        .bind(&value)
        .execute(&self.pool)
        .await?;
        debug!("Cached step state ({})", state.current_step);
        Ok(())
    }

    async fn read(&self) -> std::result::Result<Option<StepState>, CacheError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM step_cache WHERE key = ?1")
            .bind(CACHE_KEY)
            .fetch_optional(&self.pool)
            .await?;
        let Some((value,)) = row else {
            return Ok(None);
        };
        let state: StepState = serde_json::from_str(&value)?;
        if let Some(rule) = state.inconsistency() {
            return Err(CacheError::Inconsistent(rule));
        }
        Ok(Some(state))
    }

    #[cfg(test)]
    pub(crate) async fn write_raw(&self, value: &str) {
        sqlx::query("INSERT OR REPLACE INTO step_cache (key, value) VALUES (?1, ?2)")
            .bind(CACHE_KEY)
            .bind(value)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}
