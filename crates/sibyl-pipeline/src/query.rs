//! Retrieval and answer synthesis.
//!
//! A query embeds the question, searches the vector index, and asks the LLM
//! to answer from the retrieved chunk texts. When retrieval comes back empty
//! the pipeline answers with a fixed message and never calls the chat model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sibyl_llm::{ChatOptions, LlmProvider};
use sibyl_store::VectorStore;

use crate::error::PipelineError;
use crate::request::QueryRequest;
use crate::runner::StepRunner;
use crate::synthesizer;

/// Answer returned when the index holds nothing relevant.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found. Please ingest documents first.";

/// Retrieval result: chunk texts and their originating sources, index-aligned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// Source of each retrieved chunk, index-aligned with the contexts the
    /// answer was grounded in. A source appears once per chunk it
    /// contributed.
    pub sources: Vec<String>,
    pub num_contexts: usize,
}

pub struct QueryPipeline<P> {
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    chat_options: ChatOptions,
}

impl<P> std::fmt::Debug for QueryPipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("chat_options", &self.chat_options)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> QueryPipeline<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            provider,
            store,
            chat_options: ChatOptions::default(),
        }
    }

    #[must_use]
    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.chat_options = options;
        self
    }

    /// Run the query for `request` under `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] for malformed requests, or
    /// [`PipelineError::Step`] wrapping the cause when retrieval or synthesis
    /// fails after exhausting retries.
    pub async fn run(
        &self,
        runner: &StepRunner,
        request: &QueryRequest,
    ) -> Result<QueryAnswer, PipelineError> {
        request.validate()?;
        tracing::info!(
            run_id = %runner.run_id(),
            top_k = request.top_k,
            "query started"
        );

        let outcome: SearchOutcome = runner
            .run_step("embed-and-search", || self.embed_and_search(request))
            .await?;

        if outcome.contexts.is_empty() {
            tracing::info!(run_id = %runner.run_id(), "no context retrieved");
            return Ok(QueryAnswer {
                answer: NO_CONTEXT_ANSWER.to_owned(),
                sources: Vec::new(),
                num_contexts: 0,
            });
        }

        let answer: String = runner
            .run_step("synthesize-answer", || {
                synthesizer::synthesize(
                    self.provider.as_ref(),
                    &request.question,
                    &outcome.contexts,
                    self.chat_options,
                )
            })
            .await?;

        let answer = QueryAnswer {
            answer,
            num_contexts: outcome.contexts.len(),
            sources: outcome.sources,
        };
        tracing::info!(
            run_id = %runner.run_id(),
            num_contexts = answer.num_contexts,
            sources = answer.sources.len(),
            "query complete"
        );
        Ok(answer)
    }

    async fn embed_and_search(
        &self,
        request: &QueryRequest,
    ) -> Result<SearchOutcome, PipelineError> {
        let vectors = self.provider.embed(&[request.question.clone()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            PipelineError::Llm(sibyl_llm::LlmError::EmbedBatchMismatch {
                sent: 1,
                received: 0,
            })
        })?;

        let hits = self.store.search(vector, request.top_k).await?;
        tracing::debug!(hits = hits.len(), "retrieval complete");

        let (contexts, sources) = hits
            .into_iter()
            .map(|hit| (hit.payload.text, hit.payload.source))
            .unzip();
        Ok(SearchOutcome { contexts, sources })
    }
}
