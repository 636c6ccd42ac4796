//! Durable document ingestion.
//!
//! Ingestion is two named steps. "load-and-chunk" extracts text and splits
//! it; "embed-and-upsert" embeds the chunks in one batch and writes them to
//! the vector index under deterministic IDs. Each step is memoized per run,
//! so a crash between the steps resumes without re-extracting, and a full
//! re-run of a completed ingestion touches neither the provider nor the
//! store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sibyl_llm::LlmProvider;
use sibyl_store::{ChunkPayload, VectorPoint, VectorStore};

use crate::chunk_id::ChunkId;
use crate::document::{Chunk, DocumentError, DocumentLoader, TextLoader, TextSplitter};
use crate::error::PipelineError;
use crate::request::IngestRequest;
use crate::runner::StepRunner;

/// Output of the "load-and-chunk" step, recorded in the step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAndSource {
    pub chunks: Vec<Chunk>,
    pub source_id: String,
}

/// Output of a completed ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Number of chunks written to the index.
    pub ingested: usize,
}

pub struct IngestionPipeline<P> {
    splitter: TextSplitter,
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl<P> std::fmt::Debug for IngestionPipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("splitter", &self.splitter)
            .field("loaders", &self.loaders.len())
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> IngestionPipeline<P> {
    /// Pipeline with the default loader set: plain text, plus PDF when the
    /// `pdf` feature is enabled.
    #[must_use]
    pub fn new(splitter: TextSplitter, provider: Arc<P>, store: Arc<dyn VectorStore>) -> Self {
        #[cfg(not(feature = "pdf"))]
        let loaders: Vec<Arc<dyn DocumentLoader>> = vec![Arc::new(TextLoader::default())];
        #[cfg(feature = "pdf")]
        let loaders: Vec<Arc<dyn DocumentLoader>> = vec![
            Arc::new(TextLoader::default()),
            Arc::new(crate::document::PdfLoader::default()),
        ];
        Self {
            splitter,
            provider,
            store,
            loaders,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Run the full ingestion for `request` under `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] for malformed requests,
    /// [`PipelineError::Step`] wrapping the cause when a step fails after
    /// exhausting retries.
    pub async fn run(
        &self,
        runner: &StepRunner,
        request: &IngestRequest,
    ) -> Result<IngestResult, PipelineError> {
        request.validate()?;
        let source_id = request.resolve_source_id()?;
        tracing::info!(
            run_id = %runner.run_id(),
            source_id = %source_id,
            path = %request.path.display(),
            "ingestion started"
        );

        let chunked: ChunkAndSource = runner
            .run_step("load-and-chunk", || self.load_and_chunk(request, &source_id))
            .await?;

        let result = runner
            .run_step("embed-and-upsert", || self.embed_and_upsert(&chunked))
            .await?;

        tracing::info!(
            run_id = %runner.run_id(),
            source_id = %chunked.source_id,
            ingested = result.ingested,
            "ingestion complete"
        );
        Ok(result)
    }

    async fn load_and_chunk(
        &self,
        request: &IngestRequest,
        source_id: &str,
    ) -> Result<ChunkAndSource, PipelineError> {
        let loader = self.loader_for(&request.path)?;
        let document = loader.load(&request.path).await.map_err(PipelineError::Extraction)?;

        if document.content.trim().is_empty() {
            return Err(PipelineError::Extraction(DocumentError::EmptyDocument(
                source_id.to_owned(),
            )));
        }

        let chunks: Vec<Chunk> = self
            .splitter
            .split(&document.content)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                content,
                source: source_id.to_owned(),
                index,
            })
            .collect();

        tracing::debug!(source_id, chunks = chunks.len(), "document chunked");
        Ok(ChunkAndSource {
            chunks,
            source_id: source_id.to_owned(),
        })
    }

    async fn embed_and_upsert(
        &self,
        chunked: &ChunkAndSource,
    ) -> Result<IngestResult, PipelineError> {
        if chunked.chunks.is_empty() {
            return Ok(IngestResult { ingested: 0 });
        }

        let texts: Vec<String> = chunked.chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed(&texts).await?;

        let points: Vec<VectorPoint> = chunked
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: ChunkId::derive(&chunked.source_id, chunk.index).to_string(),
                vector,
                payload: ChunkPayload {
                    source: chunked.source_id.clone(),
                    text: chunk.content.clone(),
                },
            })
            .collect();

        self.store.ensure_collection().await?;
        let ingested = points.len();
        self.store.upsert(points).await?;

        Ok(IngestResult { ingested })
    }

    fn loader_for(&self, path: &std::path::Path) -> Result<&dyn DocumentLoader, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                PipelineError::Extraction(DocumentError::UnsupportedFormat(ext))
            })
    }
}
