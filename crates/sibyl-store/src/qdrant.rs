//! Qdrant-backed vector store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, value::Kind,
};

use crate::vector_store::{
    ChunkPayload, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError, check_dimensions,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector store over a Qdrant collection with cosine distance.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("collection", &self.collection)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Create a new `QdrantStore` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(
        url: &str,
        collection: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
            dimensions,
        })
    }

    fn to_point(&self, p: VectorPoint) -> Result<PointStruct, VectorStoreError> {
        check_dimensions(self.dimensions, p.vector.len())?;
        let payload_map: HashMap<String, qdrant_client::qdrant::Value> =
            serde_json::from_value(serde_json::json!({
                "source": p.payload.source,
                "text": p.payload.text,
            }))
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(PointStruct::new(p.id, p.vector, payload_map))
    }
}

fn payload_str(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

impl VectorStore for QdrantStore {
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
            if exists {
                return Ok(());
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimensions as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
            tracing::info!(
                collection = %self.collection,
                dimensions = self.dimensions,
                "created Qdrant collection"
            );
            Ok(())
        })
    }

    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let points: Vec<PointStruct> = points
                .into_iter()
                .map(|p| self.to_point(p))
                .collect::<Result<_, _>>()?;
            if points.is_empty() {
                return Ok(());
            }
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
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
            let results = self
                .client
                .search_points(
                    SearchPointsBuilder::new(&self.collection, vector, limit).with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;

            Ok(results
                .result
                .into_iter()
                .filter_map(|point| {
                    let source = payload_str(&point.payload, "source")?;
                    let text = payload_str(&point.payload, "text")?;
                    let id = point.id.and_then(|id| match id.point_id_options? {
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => Some(u),
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => {
                            Some(n.to_string())
                        }
                    })?;
                    Some(ScoredVectorPoint {
                        id,
                        score: point.score,
                        payload: ChunkPayload { source, text },
                    })
                })
                .collect())
        })
    }

    fn count_by_source(&self, source: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let source = source.to_owned();
        Box::pin(async move {
            let response = self
                .client
                .count(
                    CountPointsBuilder::new(&self.collection)
                        .filter(Filter::must([Condition::matches("source", source)]))
                        .exact(true),
                )
                .await
                .map_err(|e| VectorStoreError::Unavailable(e.to_string()))?;
            Ok(response.result.map_or(0, |r| r.count))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_point_rejects_wrong_dimensions() {
        let store = QdrantStore::new("http://127.0.0.1:6334", "docs", 3).unwrap();
        let err = store
            .to_point(VectorPoint {
                id: "a".into(),
                vector: vec![1.0],
                payload: ChunkPayload {
                    source: "doc".into(),
                    text: "t".into(),
                },
            })
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                got: 1
            }
        ));
    }

    #[test]
    fn debug_shows_collection_not_client() {
        let store = QdrantStore::new("http://127.0.0.1:6334", "docs", 3).unwrap();
        let dbg = format!("{store:?}");
        assert!(dbg.contains("docs"));
    }
}
