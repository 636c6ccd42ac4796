use crate::document::{DocumentError, SplitterError};
use crate::runner::StepLogError;
use sibyl_llm::LlmError;
use sibyl_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad chunking parameters. Fatal: retrying cannot help.
    #[error("invalid chunking config: {0}")]
    InvalidConfig(#[from] SplitterError),

    /// Malformed run request rejected at the boundary. Fatal.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unreadable source document. Fatal for this run.
    #[error("extraction failed: {0}")]
    Extraction(#[from] DocumentError),

    /// Embedding or language-model call failure. Transient.
    #[error("provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("step log error: {0}")]
    StepLog(#[from] StepLogError),

    /// A named step failed; wraps the underlying cause so operators see
    /// where in the run the failure originated.
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Whether the surrounding retry policy may re-run the failed step.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidConfig(_) | Self::InvalidRequest(_) | Self::Extraction(_) => false,
            Self::Llm(_) => true,
            Self::Store(e) => e.is_transient(),
            Self::StepLog(e) => e.is_transient(),
            Self::Step { source, .. } => source.is_transient(),
        }
    }

    pub(crate) fn in_step(self, step: &str) -> Self {
        Self::Step {
            step: step.to_owned(),
            source: Box::new(self),
        }
    }
}
