/*!
SQLite-backed state store.

## Behavior

- One row per run in the `runs` table, replaced whole by an upsert on every
  save; SQLite's journaling gives the atomic-replace guarantee, so a reader
  never observes a half-written record.
- Uses the serde persistence model (see `store::persistence`) for the
  payload column; database I/O stays in this module, pure serialization
  stays out of it.
- When the `sqlite-migrations` feature is enabled (default), embedded
  migrations (`sqlx::migrate!("./migrations")`) run on connect; disabling
  the feature assumes external migration orchestration.
*/

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::state::RunState;
use crate::types::RunId;

use super::persistence::PersistedRun;
use super::{Result, StateStore, StoreError};

/// Durable run storage on SQLite.
pub struct SqliteStateStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore").finish()
    }
}

impl SqliteStateStore {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: `sqlite://paperflow.db`
    #[must_use = "store must be used to persist runs"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        // Ensure the underlying file exists before sqlx opens it; connect
        // does not create missing files.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.trim();
            if !path.is_empty() && path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if !p.exists() {
                    let _ = std::fs::File::create(p);
                }
            }
        }

        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("connect error: {e}"),
            })?;

        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(StoreError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait::async_trait]
impl StateStore for SqliteStateStore {
    #[instrument(skip(self, state), fields(run = %state.run_id), err)]
    async fn save(&self, state: &RunState) -> Result<()> {
        let persisted = PersistedRun::from(state);
        let payload_json = serde_json::to_string(&persisted.payload)
            .map_err(|e| StoreError::Serde { source: e })?;

        // Single-statement upsert: the replace is atomic per run id.
        sqlx::query(
            r#"
            INSERT INTO runs (run_id, source_reference, phase, payload_json, error, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(run_id) DO UPDATE SET
                source_reference = excluded.source_reference,
                phase = excluded.phase,
                payload_json = excluded.payload_json,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&persisted.run_id)
        .bind(&persisted.source_reference)
        .bind(&persisted.phase)
        .bind(&payload_json)
        .bind(&persisted.error)
        .bind(persisted.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StoreError::Backend {
            message: format!("upsert run: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self, run_id), err)]
    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, source_reference, phase, payload_json, error, updated_at
            FROM runs
            WHERE run_id = ?1
            "#,
        )
        .bind(run_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| StoreError::Backend {
            message: format!("select run: {e}"),
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload_json: String = row.get("payload_json");
        let updated_at_raw: String = row.get("updated_at");
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let persisted = PersistedRun {
            run_id: row.get("run_id"),
            source_reference: row.get("source_reference"),
            phase: row.get("phase"),
            payload: serde_json::from_str(&payload_json)
                .map_err(|e| StoreError::Serde { source: e })?,
            error: row.get("error"),
            updated_at,
        };

        Ok(Some(RunState::try_from(persisted)?))
    }

    #[instrument(skip(self), err)]
    async fn list_runs(&self) -> Result<Vec<RunId>> {
        let rows = sqlx::query("SELECT run_id FROM runs")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("select runs: {e}"),
            })?;

        Ok(rows
            .into_iter()
            .map(|row| RunId::from_string(row.get::<String, _>("run_id")))
            .collect())
    }
}
