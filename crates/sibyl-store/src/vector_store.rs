use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    /// Vector length does not match the collection dimensionality. Signals a
    /// configuration bug; never retried.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The index cannot be reached. Transient; the caller's retry policy applies.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("vector store backend error: {0}")]
    Backend(String),
}

impl VectorStoreError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Metadata stored alongside every vector: the originating document and the
/// chunk text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Upsert/search facade over an external vector index.
///
/// One store instance addresses one collection with a fixed vector
/// dimensionality. Implementations must tolerate concurrent `upsert`/`search`
/// calls from unrelated runs; upserts sharing an ID are last-writer-wins.
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert or overwrite points by ID. Repeating the same call with
    /// identical points is a no-op in effect.
    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Return up to `limit` points ranked by descending similarity. An empty
    /// index yields an empty result, not an error.
    fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    /// Number of stored points whose payload source equals `source`.
    fn count_by_source(&self, source: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;

    /// Fixed vector dimensionality of the collection.
    fn dimensions(&self) -> usize;
}

pub(crate) fn check_dimensions(expected: usize, got: usize) -> Result<(), VectorStoreError> {
    if expected == got {
        Ok(())
    } else {
        Err(VectorStoreError::DimensionMismatch { expected, got })
    }
}
