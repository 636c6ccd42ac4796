use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StepLogError {
    #[error("step log database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("step output serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("step log lock poisoned: {0}")]
    Poisoned(String),
}

impl StepLogError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted step-result log keyed by `(run_id, step_name)`.
///
/// `put` is first-writer-wins: if a racing retry already recorded an output
/// for the key, the existing record is kept. Readers therefore always observe
/// one stable output per completed step.
pub trait StepLog: Send + Sync {
    fn get(
        &self,
        run_id: &str,
        step: &str,
    ) -> BoxFuture<'_, Result<Option<serde_json::Value>, StepLogError>>;

    fn put(
        &self,
        run_id: &str,
        step: &str,
        output: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), StepLogError>>;
}

/// Process-local step log for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStepLog {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryStepLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded step results.
    ///
    /// # Panics
    ///
    /// Panics if the inner lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StepLog for MemoryStepLog {
    fn get(
        &self,
        run_id: &str,
        step: &str,
    ) -> BoxFuture<'_, Result<Option<serde_json::Value>, StepLogError>> {
        let key = (run_id.to_owned(), step.to_owned());
        Box::pin(async move {
            let entries = self
                .entries
                .read()
                .map_err(|e| StepLogError::Poisoned(e.to_string()))?;
            Ok(entries.get(&key).cloned())
        })
    }

    fn put(
        &self,
        run_id: &str,
        step: &str,
        output: serde_json::Value,
    ) -> BoxFuture<'_, Result<(), StepLogError>> {
        let key = (run_id.to_owned(), step.to_owned());
        Box::pin(async move {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| StepLogError::Poisoned(e.to_string()))?;
            entries.entry(key).or_insert(output);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_returns_none() {
        let log = MemoryStepLog::new();
        assert!(log.get("run", "step").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let log = MemoryStepLog::new();
        log.put("run", "step", serde_json::json!({"n": 1}))
            .await
            .unwrap();
        let value = log.get("run", "step").await.unwrap().unwrap();
        assert_eq!(value["n"], 1);
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let log = MemoryStepLog::new();
        log.put("run", "step", serde_json::json!(1)).await.unwrap();
        log.put("run", "step", serde_json::json!(2)).await.unwrap();
        assert_eq!(log.get("run", "step").await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn keys_are_scoped_by_run_and_step() {
        let log = MemoryStepLog::new();
        log.put("run-a", "step", serde_json::json!("a")).await.unwrap();
        log.put("run-b", "step", serde_json::json!("b")).await.unwrap();
        log.put("run-a", "other", serde_json::json!("c")).await.unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.get("run-a", "step").await.unwrap().unwrap(), "a");
        assert_eq!(log.get("run-b", "step").await.unwrap().unwrap(), "b");
    }
}
