//! Ingestion orchestrator: drives one document from raw upload to fully
//! indexed, with compensating rollback so a document is either completely
//! indexed or has no vector presence at all.
//!
//! The job transport guarantees at-least-once delivery, so every step here
//! is safe to repeat: chunk and vector identities derive from
//! `(doc_id, seq)` and re-running an attempt overwrites rather than
//! duplicates.

use std::path::Path;

use crate::chunking::chunk_text;
use crate::error::PipelineError;
use crate::extract::extract_text;
use crate::index::vector_id;
use crate::models::{Chunk, DocumentStatus, VectorMapping};
use crate::pipeline::Pipeline;

/// Embedding batch size within one document; each batch that lands in the
/// index is tracked so a later failure can roll the whole attempt back.
const EMBED_BATCH: usize = 32;

impl Pipeline {
    /// Run the full ingestion state machine for `doc_id`:
    /// `queued -> processing -> indexed`, or `failed` on any unrecoverable
    /// stage error.
    pub async fn ingest_document(&self, doc_id: uuid::Uuid) -> Result<(), PipelineError> {
        let document = self
            .store
            .get_document(&doc_id)
            .ok_or_else(|| PipelineError::NotFound(format!("document {doc_id}")))?;

        self.store
            .set_status(&doc_id, DocumentStatus::Processing)?;

        // ── Step 1: extract text ─────────────────────────
        let text = match extract_text(Path::new(&document.location)) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Extraction failed for {doc_id}: {e}");
                self.store
                    .set_status(&doc_id, DocumentStatus::Failed(e.to_string()))?;
                return Err(e);
            }
        };

        // ── Step 2: chunk ────────────────────────────────
        let token_chunks = chunk_text(&text, &self.chunking);
        if token_chunks.is_empty() {
            let e = PipelineError::EmptyDocument;
            tracing::warn!("Document {doc_id} ({}) produced no chunks", document.filename);
            self.store
                .set_status(&doc_id, DocumentStatus::Failed(e.to_string()))?;
            return Err(e);
        }

        let chunks: Vec<Chunk> = token_chunks
            .into_iter()
            .map(|tc| Chunk {
                chunk_id: Chunk::id_for(&doc_id, tc.seq),
                doc_id,
                user_id: document.user_id.clone(),
                text: tc.text,
                seq: tc.seq,
                tokens: tc.tokens,
            })
            .collect();

        // ── Step 3: persist chunks ───────────────────────
        self.store.upsert_chunks(&doc_id, &chunks)?;
        tracing::info!("Persisted {} chunks for {doc_id}", chunks.len());

        // Clear any vector presence from a previous attempt; the new chunk
        // set may be smaller than the old one.
        let stale = self.store.mappings_for_document(&doc_id);
        if !stale.is_empty() {
            let ids: Vec<i64> = stale.iter().map(|m| m.vector_id).collect();
            self.vectors.remove(&ids)?;
            self.store.delete_mappings(&doc_id)?;
        }

        // ── Step 4: embed and index ──────────────────────
        if let Err(e) = self.embed_and_index(&document.user_id, &chunks).await {
            tracing::error!("Embedding/indexing failed for {doc_id}, rolling back: {e}");
            self.rollback_vectors(&doc_id, &chunks)?;
            self.store
                .set_status(&doc_id, DocumentStatus::Failed(e.to_string()))?;
            return Err(e);
        }

        // ── Step 5: mark indexed ─────────────────────────
        self.store.mark_indexed(&doc_id, chunks.len())?;
        tracing::info!("Document {doc_id} indexed ({} chunks)", chunks.len());
        Ok(())
    }

    /// Embed chunks batch by batch, writing vectors and their mappings as
    /// each batch completes. Any error aborts the attempt; the caller rolls
    /// back everything written so far.
    async fn embed_and_index(&self, user_id: &str, chunks: &[Chunk]) -> Result<(), PipelineError> {
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let vectors: Vec<(i64, Vec<f32>)> = batch
                .iter()
                .zip(embeddings)
                .map(|(c, e)| (vector_id(&c.chunk_id), e))
                .collect();
            let mappings: Vec<VectorMapping> = batch
                .iter()
                .map(|c| VectorMapping {
                    vector_id: vector_id(&c.chunk_id),
                    chunk_id: c.chunk_id.clone(),
                    doc_id: c.doc_id,
                    user_id: user_id.to_string(),
                })
                .collect();

            self.vectors.add(&vectors)?;
            self.store.upsert_mappings(&mappings)?;
        }
        Ok(())
    }

    /// Remove every vector and mapping this attempt could have written.
    /// Identities are deterministic, so deriving them from the chunk list
    /// covers exactly the ids the attempt used.
    fn rollback_vectors(&self, doc_id: &uuid::Uuid, chunks: &[Chunk]) -> Result<(), PipelineError> {
        let ids: Vec<i64> = chunks.iter().map(|c| vector_id(&c.chunk_id)).collect();
        self.vectors.remove(&ids)?;
        self.store.delete_mappings(doc_id)?;
        Ok(())
    }
}
