//! Validated pipeline run requests.
//!
//! Requests arrive from the outside world (CLI flags, queue payloads) and
//! are checked here before a pipeline ever runs, so the pipelines can
//! assume well-formed inputs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_TOP_K: u64 = 5;

/// Request to ingest one document into the vector index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Path to the document on disk.
    pub path: PathBuf,
    /// Stable identity for the document. Defaults to the file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl IngestRequest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_id: None,
        }
    }

    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// The effective source id: the explicit one, or the file name.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] when no source id was given
    /// and the path has no file name to fall back on.
    pub fn resolve_source_id(&self) -> Result<String, PipelineError> {
        if let Some(id) = &self.source_id {
            return Ok(id.clone());
        }
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::InvalidRequest(format!(
                    "cannot derive source id from path {}",
                    self.path.display()
                ))
            })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] when the path is empty or
    /// an explicit source id is blank.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.path.as_os_str().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "ingest path must not be empty".into(),
            ));
        }
        if let Some(id) = &self.source_id
            && id.trim().is_empty()
        {
            return Err(PipelineError::InvalidRequest(
                "source id must not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// Request to answer a question against the ingested corpus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Number of chunks to retrieve.
    #[serde(default = "default_top_k")]
    pub top_k: u64,
}

fn default_top_k() -> u64 {
    DEFAULT_TOP_K
}

impl QueryRequest {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: u64) -> Self {
        self.top_k = top_k;
        self
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] when the question is blank
    /// or `top_k` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.question.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "question must not be blank".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(PipelineError::InvalidRequest(
                "top_k must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A request dispatched to one of the pipelines.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunRequest {
    Ingest(IngestRequest),
    Query(QueryRequest),
}

impl RunRequest {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRequest`] when the inner request is
    /// malformed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Self::Ingest(req) => req.validate(),
            Self::Query(req) => req.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_defaults_to_file_name() {
        let req = IngestRequest::new("/data/docs/report.pdf");
        assert_eq!(req.resolve_source_id().unwrap(), "report.pdf");
    }

    #[test]
    fn explicit_source_id_wins() {
        let req = IngestRequest::new("/data/docs/report.pdf").with_source_id("q3-report");
        assert_eq!(req.resolve_source_id().unwrap(), "q3-report");
    }

    #[test]
    fn source_id_fails_for_pathless_input() {
        let req = IngestRequest::new("/");
        assert!(matches!(
            req.resolve_source_id(),
            Err(PipelineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn blank_explicit_source_id_rejected() {
        let req = IngestRequest::new("/data/a.txt").with_source_id("   ");
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_path_rejected() {
        let req = IngestRequest::new("");
        assert!(req.validate().is_err());
    }

    #[test]
    fn blank_question_rejected() {
        assert!(QueryRequest::new("  ").validate().is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        assert!(QueryRequest::new("q").with_top_k(0).validate().is_err());
    }

    #[test]
    fn top_k_defaults_when_absent_from_json() {
        let req: QueryRequest = serde_json::from_str(r#"{"question":"what?"}"#).unwrap();
        assert_eq!(req.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn run_request_round_trips_with_tag() {
        let req = RunRequest::Query(QueryRequest::new("why?"));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""kind":"query""#));
        let back: RunRequest = serde_json::from_str(&json).unwrap();
        assert!(back.validate().is_ok());
    }
}
