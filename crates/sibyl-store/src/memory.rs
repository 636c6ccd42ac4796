//! In-memory vector store for tests and offline runs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::vector_store::{
    ChunkPayload, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, check_dimensions,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredPoint {
    vector: Vec<f32>,
    payload: ChunkPayload,
    /// Monotonic insertion sequence; ties in similarity rank newest first.
    seq: u64,
}

struct Inner {
    points: HashMap<String, StoredPoint>,
    next_seq: u64,
}

pub struct InMemoryVectorStore {
    dimensions: usize,
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            inner: RwLock::new(Inner {
                points: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Total number of stored points.
    ///
    /// # Panics
    ///
    /// Panics if the inner lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            for p in &points {
                check_dimensions(self.dimensions, p.vector.len())?;
            }
            let mut inner = self
                .inner
                .write()
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            for p in points {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                        seq,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        Box::pin(async move {
            check_dimensions(self.dimensions, vector.len())?;
            let inner = self
                .inner
                .read()
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;

            let mut scored: Vec<(u64, ScoredVectorPoint)> = inner
                .points
                .iter()
                .map(|(id, sp)| {
                    (
                        sp.seq,
                        ScoredVectorPoint {
                            id: id.clone(),
                            score: cosine_similarity(&vector, &sp.vector),
                            payload: sp.payload.clone(),
                        },
                    )
                })
                .collect();

            scored.sort_by(|(seq_a, a), (seq_b, b)| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(seq_b.cmp(seq_a))
            });
            #[expect(clippy::cast_possible_truncation)]
            scored.truncate(limit as usize);
            Ok(scored.into_iter().map(|(_, p)| p).collect())
        })
    }

    fn count_by_source(&self, source: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let source = source.to_owned();
        Box::pin(async move {
            let inner = self
                .inner
                .read()
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            Ok(inner
                .points
                .values()
                .filter(|sp| sp.payload.source == source)
                .count() as u64)
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
