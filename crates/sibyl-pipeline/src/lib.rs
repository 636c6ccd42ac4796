//! Retrieval-augmented pipeline core: deterministic chunking, idempotent
//! embedding/upsert, and query-time retrieval + answer synthesis, executed as
//! durable, independently-retriable steps.

pub mod chunk_id;
pub mod document;
pub mod error;
pub mod ingest;
pub mod query;
pub mod request;
pub mod runner;
pub mod synthesizer;

pub use chunk_id::ChunkId;
pub use error::PipelineError;
pub use ingest::{ChunkAndSource, IngestResult, IngestionPipeline};
pub use query::{NO_CONTEXT_ANSWER, QueryAnswer, QueryPipeline, SearchOutcome};
pub use request::{IngestRequest, QueryRequest, RunRequest};
pub use runner::{RetryPolicy, StepRunner};
