//! Vector index facade: upsert/search over Qdrant or an in-memory backend.

pub mod memory;
pub mod qdrant;
pub mod vector_store;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use vector_store::{
    ChunkPayload, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};
