use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where uploads, the lexical index, and vector data are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration (embeddings + answer generation)
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Document chunking parameters
    pub chunking: ChunkingConfig,
    /// Query-time retrieval parameters
    pub retrieval: RetrievalConfig,
    /// Maximum concurrent ingestion jobs
    pub max_concurrent_ingests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension; must match the vector index
    pub embedding_dim: usize,
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server
/// with a reranker model behind `/v1/rerank`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, reranking falls back to the merged retrieval score.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

/// Fixed-window chunking parameters, in whitespace tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Tokens per window.
    pub window: usize,
    /// Overlap carried into the next window; windows advance by
    /// `window - stride` tokens.
    pub stride: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched from the dense (vector) path.
    pub k_dense: usize,
    /// Candidates fetched from the sparse (lexical) path.
    pub k_sparse: usize,
    /// Candidates kept after reranking and fed to the synthesizer.
    pub top_n: usize,
    /// Token budget for the generation context window.
    pub context_token_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            max_concurrent_ingests: 2,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: 500,
            stride: 100,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_dense: 10,
            k_sparse: 10,
            top_n: 3,
            context_token_budget: 1600,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(val) = std::env::var("RAG_CHUNK_WINDOW") {
            if let Ok(v) = val.parse() {
                config.chunking.window = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_CHUNK_STRIDE") {
            if let Ok(v) = val.parse() {
                config.chunking.stride = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_K_DENSE") {
            if let Ok(v) = val.parse() {
                config.retrieval.k_dense = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_K_SPARSE") {
            if let Ok(v) = val.parse() {
                config.retrieval.k_sparse = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_RERANK_TOP_N") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_n = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_CONTEXT_TOKEN_BUDGET") {
            if let Ok(v) = val.parse() {
                config.retrieval.context_token_budget = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_MAX_CONCURRENT_INGESTS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_ingests = v;
            }
        }

        // Reranker config
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        config
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}
