//! Durable step execution.
//!
//! A run is a sequence of named steps. Completed step outputs are recorded in
//! a [`StepLog`] keyed by `(run_id, step_name)`; re-invoking the same run
//! skips steps that already have a recorded result. Combined with
//! deterministic chunk IDs and idempotent upserts, this gives exactly-once
//! *effective* ingestion under at-least-once execution.

mod log;
mod sqlite;

pub use log::{MemoryStepLog, StepLog, StepLogError};
pub use sqlite::SqliteStepLog;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::PipelineError;

/// Backoff applied to transient step failures. Fatal failures are never
/// retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No retries, used by flows that surface failures directly to the caller.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Executes named steps at most effectively once per run.
#[derive(Clone)]
pub struct StepRunner {
    log: Arc<dyn StepLog>,
    run_id: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("run_id", &self.run_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl StepRunner {
    #[must_use]
    pub fn new(log: Arc<dyn StepLog>, run_id: impl Into<String>) -> Self {
        Self {
            log,
            run_id: run_id.into(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run `body` under the name `step`, memoizing its output.
    ///
    /// If the step log already holds a result for `(run_id, step)`, that
    /// result is returned and `body` is not invoked. Otherwise `body` runs,
    /// retried with backoff on transient failures, and its output is recorded
    /// before being returned.
    ///
    /// # Errors
    ///
    /// Returns the step's failure wrapped with the step name, or a step log
    /// failure.
    pub async fn run_step<T, F, Fut>(&self, step: &str, body: F) -> Result<T, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        if let Some(recorded) = self.log.get(&self.run_id, step).await? {
            tracing::debug!(run_id = %self.run_id, step, "step already complete, skipping");
            let value =
                serde_json::from_value(recorded).map_err(StepLogError::Serialization)?;
            return Ok(value);
        }

        let mut attempt = 0u32;
        let output = loop {
            match body().await {
                Ok(output) => break output,
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        run_id = %self.run_id,
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient step failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(run_id = %self.run_id, step, error = %e, "step failed");
                    return Err(e.in_step(step));
                }
            }
        };

        let value = serde_json::to_value(&output).map_err(StepLogError::Serialization)?;
        self.log.put(&self.run_id, step, value).await?;
        tracing::debug!(run_id = %self.run_id, step, "step complete");
        Ok(output)
    }
}
