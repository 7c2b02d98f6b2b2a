//! Reranker invoker: second-pass scoring of the merged candidate set with
//! the cross-encoder, falling back to the merged retrieval order when the
//! scorer is unavailable. A query never hard-fails here.

use crate::error::PipelineError;
use crate::models::{Candidate, RankedCandidate};
use crate::pipeline::Pipeline;

/// A candidate with its chunk resolved and (optionally) cross-encoder
/// scored.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk_id: String,
    pub doc_id: uuid::Uuid,
    pub seq: usize,
    pub text: String,
    /// Pre-rerank merged retrieval score.
    pub merged: f32,
    /// Cross-encoder score; None in fallback mode.
    pub rerank: Option<f32>,
}

impl Pipeline {
    /// Score `candidates` against `query_text` and keep the top
    /// `retrieval.top_n`, in descending relevance.
    pub async fn rerank(
        &self,
        query_text: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<RankedCandidate>, PipelineError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Resolve chunk text; a candidate whose chunk vanished under us
        // (deletion raced the query) is silently dropped.
        let mut entries: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(chunk) = self.store.get_chunk(&candidate.chunk_id) else {
                tracing::warn!("Candidate chunk {} no longer exists; dropping", candidate.chunk_id);
                continue;
            };
            entries.push(ScoredCandidate {
                chunk_id: candidate.chunk_id,
                doc_id: candidate.doc_id,
                seq: chunk.seq,
                text: chunk.text,
                merged: candidate.score,
                rerank: None,
            });
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        match self.scorer.score(query_text, &documents).await {
            Ok(scores) if scores.len() == entries.len() => {
                for (entry, score) in entries.iter_mut().zip(scores) {
                    entry.rerank = Some(score);
                }
            }
            Ok(scores) => {
                tracing::warn!(
                    "Scorer returned {} scores for {} candidates; using merged-score order",
                    scores.len(),
                    entries.len()
                );
            }
            Err(e) => {
                tracing::warn!("Reranker unavailable, using merged-score order: {e}");
            }
        }

        Ok(select_top_n(entries, self.retrieval.top_n))
    }
}

/// Order candidates by cross-encoder score, ties broken by the pre-rerank
/// merged score, then by chunk sequence index, then by chunk id. In
/// fallback mode (no cross-encoder scores) the merged score leads.
pub fn select_top_n(mut entries: Vec<ScoredCandidate>, top_n: usize) -> Vec<RankedCandidate> {
    entries.sort_by(|a, b| {
        let by_rerank = match (a.rerank, b.rerank) {
            (Some(ra), Some(rb)) => rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        };
        by_rerank
            .then_with(|| {
                b.merged
                    .partial_cmp(&a.merged)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.seq.cmp(&b.seq))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    entries.truncate(top_n);

    entries
        .into_iter()
        .map(|e| RankedCandidate {
            score: e.rerank.unwrap_or(e.merged),
            chunk_id: e.chunk_id,
            doc_id: e.doc_id,
            seq: e.seq,
            text: e.text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(chunk_id: &str, seq: usize, merged: f32, rerank: Option<f32>) -> ScoredCandidate {
        ScoredCandidate {
            chunk_id: chunk_id.to_string(),
            doc_id: Uuid::nil(),
            seq,
            text: format!("text of {chunk_id}"),
            merged,
            rerank,
        }
    }

    #[test]
    fn test_orders_by_rerank_score() {
        let entries = vec![
            entry("a", 0, 0.9, Some(0.2)),
            entry("b", 1, 0.1, Some(0.8)),
            entry("c", 2, 0.5, Some(0.5)),
        ];
        let ranked = select_top_n(entries, 3);
        let ids: Vec<&str> = ranked.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].score, 0.8);
    }

    #[test]
    fn test_rerank_tie_breaks_on_merged_then_seq() {
        let entries = vec![
            entry("a", 3, 0.2, Some(0.5)),
            entry("b", 1, 0.9, Some(0.5)),
            entry("c", 0, 0.2, Some(0.5)),
        ];
        let ranked = select_top_n(entries, 3);
        let ids: Vec<&str> = ranked.iter().map(|r| r.chunk_id.as_str()).collect();
        // Equal rerank: merged 0.9 wins, then seq 0 before seq 3.
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fallback_uses_merged_score() {
        let entries = vec![
            entry("a", 0, 0.3, None),
            entry("b", 1, 0.7, None),
            entry("c", 2, 0.5, None),
        ];
        let ranked = select_top_n(entries, 2);
        let ids: Vec<&str> = ranked.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(ranked[0].score, 0.7);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let make = || {
            vec![
                entry("d", 2, 0.4, Some(0.6)),
                entry("a", 0, 0.4, Some(0.6)),
                entry("c", 1, 0.4, Some(0.6)),
                entry("b", 1, 0.4, Some(0.6)),
            ]
        };
        let first = select_top_n(make(), 4);
        for _ in 0..5 {
            let again = select_top_n(make(), 4);
            let ids: Vec<_> = again.iter().map(|r| r.chunk_id.clone()).collect();
            let expected: Vec<_> = first.iter().map(|r| r.chunk_id.clone()).collect();
            assert_eq!(ids, expected);
        }
        // seq ascending, then chunk id for the seq tie.
        let ids: Vec<&str> = first.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let entries = (0..10)
            .map(|i| entry(&format!("c{i}"), i, i as f32, None))
            .collect();
        let ranked = select_top_n(entries, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].chunk_id, "c9");
    }
}
