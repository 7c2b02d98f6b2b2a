//! Error taxonomy for the ingestion and query pipelines.
//!
//! Most conditions degrade gracefully inside the pipeline (single-path
//! retrieval, merged-score rerank fallback, orphaned mappings skipped);
//! only the variants here propagate to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded file has a format the extractor cannot handle.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The file exists but its contents could not be read as text.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// Extraction succeeded but chunking produced nothing to index.
    #[error("document produced no chunks")]
    EmptyDocument,

    /// The embedding provider is unavailable or returned an error.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The answer-generation provider is unavailable or returned an error.
    #[error("generation provider error: {0}")]
    Generation(String),

    /// The cross-encoder scoring sidecar is unavailable.
    #[error("reranker error: {0}")]
    Rerank(String),

    /// Both the dense and sparse retrieval paths failed.
    #[error("both retrieval paths are unavailable")]
    RetrievalUnavailable,

    /// An embedding's length does not match the index's configured
    /// dimension. Fatal configuration error.
    #[error("embedding dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Unknown document or chunk id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store or filesystem failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// True for failures of an external model call that a job-level retry
    /// may resolve (as opposed to bad input or misconfiguration).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Embedding(_)
                | PipelineError::Generation(_)
                | PipelineError::Rerank(_)
                | PipelineError::RetrievalUnavailable
        )
    }
}
