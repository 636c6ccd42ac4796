//! SQLite-backed step-result log.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::log::{StepLog, StepLogError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct SqliteStepLog {
    pool: SqlitePool,
}

impl SqliteStepLog {
    /// Open (or create) the step-result database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub async fn new(path: &str) -> Result<Self, StepLogError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // An in-memory database exists per connection; keep the pool at one
        // so every query sees the same database.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS step_results (
                run_id TEXT NOT NULL,
                step_name TEXT NOT NULL,
                output TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (run_id, step_name)
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl StepLog for SqliteStepLog {
    fn get(
        &self,
        run_id: &str,
        step: &str,
    ) -> BoxFuture<'_, Result<Option<serde_json::Value>, StepLogError>> {
        let run_id = run_id.to_owned();
        let step = step.to_owned();
        Box::pin(async move {
            let row: Option<(String,)> = sqlx::query_as(
                "SELECT output FROM step_results WHERE run_id = ? AND step_name = ?",
            )
            .bind(&run_id)
            .bind(&step)
            .fetch_optional(&self.pool)
            .await?;

            row.map(|(output,)| serde_json::from_str(&output))
                .transpose()
                .map_err(StepLogError::Serialization)
        })
    }

    fn put(
        &self,
        run_id: &str,
        step: &str,
        output: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), StepLogError>> {
        let run_id = run_id.to_owned();
        let step = step.to_owned();
        Box::pin(async move {
            let output = serde_json::to_string(&output)?;
            // First writer wins: a racing retry keeps the recorded output.
            sqlx::query(
                "INSERT OR IGNORE INTO step_results (run_id, step_name, output) \
                 VALUES (?, ?, ?)",
            )
            .bind(&run_id)
            .bind(&step)
            .bind(&output)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}
