//! Shared application state: configuration, the pipeline, and the
//! ingestion concurrency limit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::index::metadata::MetadataStore;
use crate::index::vector::VectorIndex;
use crate::llm::cross_encoder::HttpCrossEncoder;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::generate::HttpGenerator;
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    /// Bounds concurrent background ingestion jobs.
    pub ingest_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(config.uploads_dir())
            .context("Failed to create uploads directory")?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        let store = Arc::new(MetadataStore::open_or_create(
            &config.db_path(),
            &config.index_dir(),
        )?);
        let vectors = Arc::new(VectorIndex::open_or_create(
            &config.vector_dir(),
            config.llm.embedding_dim,
        )?);

        let embedder = Arc::new(HttpEmbedder::new(client.clone(), config.llm.clone()));
        let generator = Arc::new(HttpGenerator::new(client.clone(), config.llm.clone()));
        let scorer = Arc::new(HttpCrossEncoder::new(client, config.reranker.clone()));

        let pipeline = Arc::new(Pipeline {
            store,
            vectors,
            embedder,
            generator,
            scorer,
            chunking: config.chunking,
            retrieval: config.retrieval,
        });

        Ok(Self {
            ingest_semaphore: Arc::new(Semaphore::new(config.max_concurrent_ingests)),
            config: Arc::new(config),
            pipeline,
        })
    }
}
