//! The ingestion and query pipelines, composed over the two stores and the
//! external model collaborators.

pub mod delete;
pub mod ingest;
pub mod query;
pub mod rerank;
pub mod retrieve;
pub mod synthesize;

use std::sync::Arc;

use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::index::metadata::MetadataStore;
use crate::index::vector::VectorIndex;
use crate::llm::{CrossEncoder, EmbeddingProvider, GenerationProvider};

/// Everything the orchestrators need, bundled once at startup. Multiple
/// pipelines with different configurations can coexist (used heavily in
/// tests).
pub struct Pipeline {
    pub store: Arc<MetadataStore>,
    pub vectors: Arc<VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
    pub scorer: Arc<dyn CrossEncoder>,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}
