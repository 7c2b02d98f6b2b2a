//! Hybrid retriever: dense (embedding similarity) and sparse (lexical)
//! sub-queries run concurrently, then merge into a deduplicated candidate
//! set.
//!
//! Either path failing degrades retrieval to the other path; only both
//! failing surfaces `RetrievalUnavailable`. Dense and sparse scores are
//! heterogeneous and are deliberately not normalized before the max-merge;
//! the reranker produces the final comparable ordering.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{Candidate, Provenance};
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Retrieve up to `k_dense + k_sparse` candidates for `query_text`,
    /// restricted to `user_id`'s chunks, deduplicated by chunk id.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query_text: &str,
    ) -> Result<Vec<Candidate>, PipelineError> {
        let dense_fut = self.dense_search(user_id, query_text);
        let sparse_fut = self.sparse_search(user_id, query_text);
        let (dense_result, sparse_result) = tokio::join!(dense_fut, sparse_fut);

        let dense = match dense_result {
            Ok(hits) => Some(hits),
            Err(e) => {
                tracing::warn!("Dense retrieval unavailable: {e}");
                None
            }
        };
        let sparse = match sparse_result {
            Ok(hits) => Some(hits),
            Err(e) => {
                tracing::warn!("Sparse retrieval unavailable: {e}");
                None
            }
        };

        if dense.is_none() && sparse.is_none() {
            return Err(PipelineError::RetrievalUnavailable);
        }

        Ok(merge_candidates(
            &dense.unwrap_or_default(),
            &sparse.unwrap_or_default(),
        ))
    }

    /// Embed the query and search the vector index over the user's ids,
    /// resolving hits back to chunks through the mapping table.
    async fn dense_search(
        &self,
        user_id: &str,
        query_text: &str,
    ) -> Result<Vec<(String, Uuid, f32)>, PipelineError> {
        let embedding = self.embedder.embed_query(query_text).await?;
        let allowed = self.store.vector_ids_for_user(user_id);
        let hits = self
            .vectors
            .search(&embedding, self.retrieval.k_dense, Some(&allowed))?;

        let mut resolved = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let Some(mapping) = self.store.get_mapping(id) else {
                // Vector with no mapping: inconsistent, skip and leave for repair.
                tracing::warn!("Vector {id} has no mapping; skipping");
                continue;
            };
            if self.store.get_chunk(&mapping.chunk_id).is_none() {
                tracing::warn!(
                    "Mapping for vector {id} references missing chunk {}; skipping",
                    mapping.chunk_id
                );
                continue;
            }
            resolved.push((mapping.chunk_id, mapping.doc_id, score));
        }
        Ok(resolved)
    }

    /// Lexical search over the user's chunk text.
    async fn sparse_search(
        &self,
        user_id: &str,
        query_text: &str,
    ) -> Result<Vec<(String, Uuid, f32)>, PipelineError> {
        let store = self.store.clone();
        let query = query_text.to_string();
        let user = user_id.to_string();
        let limit = self.retrieval.k_sparse;

        let hits = tokio::task::spawn_blocking(move || store.text_search(&query, &user, limit))
            .await
            .map_err(|e| PipelineError::Store(anyhow::anyhow!("sparse search task failed: {e}")))??;

        let mut resolved = Vec::with_capacity(hits.len());
        for (chunk_id, score) in hits {
            let Some(chunk) = self.store.get_chunk(&chunk_id) else {
                tracing::warn!("Lexical hit references missing chunk {chunk_id}; skipping");
                continue;
            };
            resolved.push((chunk_id, chunk.doc_id, score));
        }
        Ok(resolved)
    }
}

/// Union dense and sparse hits by chunk id. A chunk found by both paths
/// keeps the higher of its two raw scores and is tagged `both`. The result
/// is ordered by descending score, ties broken by chunk id.
pub fn merge_candidates(
    dense: &[(String, Uuid, f32)],
    sparse: &[(String, Uuid, f32)],
) -> Vec<Candidate> {
    let mut merged: HashMap<String, Candidate> = HashMap::new();

    for (chunk_id, doc_id, score) in dense {
        merged.insert(
            chunk_id.clone(),
            Candidate {
                chunk_id: chunk_id.clone(),
                doc_id: *doc_id,
                score: *score,
                provenance: Provenance::Dense,
            },
        );
    }

    for (chunk_id, doc_id, score) in sparse {
        match merged.get_mut(chunk_id) {
            Some(existing) => {
                existing.score = existing.score.max(*score);
                existing.provenance = Provenance::Both;
            }
            None => {
                merged.insert(
                    chunk_id.clone(),
                    Candidate {
                        chunk_id: chunk_id.clone(),
                        doc_id: *doc_id,
                        score: *score,
                        provenance: Provenance::Sparse,
                    },
                );
            }
        }
    }

    let mut candidates: Vec<Candidate> = merged.into_values().collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    candidates
}
