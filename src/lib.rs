//! Multi-user document question answering over hybrid retrieval.
//!
//! Uploaded documents are chunked, embedded, and indexed twice: dense
//! vectors for semantic similarity and a lexical (BM25) index for exact
//! terms. Queries fan out to both paths, merge, rerank with a
//! cross-encoder, and synthesize a cited answer with an LLM.
//!
//! ```text
//! upload ──> extract ──> chunk ──> embed ──> vector index
//!                          │                 metadata store (+ BM25)
//!                          └─────────────────────┘
//!
//! query ──> dense search ──┐
//!                          ├──> merge ──> rerank ──> synthesize ──> answer
//!       ──> sparse search ─┘                                        + sources
//! ```

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod state;
