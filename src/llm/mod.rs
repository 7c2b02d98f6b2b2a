//! External model collaborators, behind trait seams so tests can swap in
//! deterministic implementations.

pub mod cross_encoder;
pub mod embeddings;
pub mod generate;

use async_trait::async_trait;

use crate::error::PipelineError;

/// Turns text into fixed-length vectors. Dimensionality is fixed per
/// deployment and must match the vector index's configured dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        if results.is_empty() {
            return Err(PipelineError::Embedding("no embedding returned".to_string()));
        }
        Ok(results.remove(0))
    }
}

/// Produces the final answer text from an assembled prompt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Cross-encoder relevance scorer. Returns one score per document,
/// aligned by position with the input.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, PipelineError>;
}
