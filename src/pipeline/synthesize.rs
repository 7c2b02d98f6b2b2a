//! Answer synthesizer: assembles the bounded context window from the
//! ranked chunks and produces the cited answer.

use std::fmt::Write;

use crate::chunking::{token_count, truncate_tokens};
use crate::error::PipelineError;
use crate::models::{QueryResponse, RankedCandidate, Source};
use crate::pipeline::Pipeline;

const NO_CONTEXT_ANSWER: &str =
    "No relevant content was found in your documents for this question.";

impl Pipeline {
    /// Produce the final answer for `query_text` grounded in `ranked`.
    /// An empty candidate list yields a well-formed "no grounding" answer
    /// without calling the generation provider.
    pub async fn synthesize(
        &self,
        query_text: &str,
        ranked: &[RankedCandidate],
    ) -> Result<QueryResponse, PipelineError> {
        if ranked.is_empty() {
            return Ok(QueryResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = build_context(ranked, self.retrieval.context_token_budget);
        let prompt = build_prompt(query_text, &context);
        let answer = self.generator.generate(&prompt).await?;

        let sources = ranked
            .iter()
            .map(|r| Source {
                doc_id: r.doc_id,
                chunk_id: r.chunk_id.clone(),
                score: r.score,
            })
            .collect();

        Ok(QueryResponse { answer, sources })
    }
}

/// Concatenate chunk texts in ranked order into a numbered context block,
/// stopping at `token_budget` tokens. The first chunk is always included,
/// truncated if it alone exceeds the budget.
fn build_context(ranked: &[RankedCandidate], token_budget: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;

    for (i, candidate) in ranked.iter().enumerate() {
        let tokens = token_count(&candidate.text);
        let text = if i == 0 && tokens > token_budget {
            truncate_tokens(&candidate.text, token_budget.max(1))
        } else if used + tokens > token_budget && i > 0 {
            break;
        } else {
            candidate.text.clone()
        };

        used += token_count(&text);
        let _ = writeln!(context, "[{}] {}", i + 1, text);
    }

    context
}

fn build_prompt(query_text: &str, context: &str) -> String {
    format!(
        "Answer the question using ONLY the numbered context passages below. \
         Cite the passages you used as [1], [2], etc. If the context does not \
         contain the answer, say so.\n\nCONTEXTS:\n{context}\nQUESTION: {query_text}\n\
         Answer concisely."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ranked(text: &str, seq: usize) -> RankedCandidate {
        RankedCandidate {
            chunk_id: format!("doc__{seq}"),
            doc_id: Uuid::nil(),
            seq,
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_context_preserves_ranked_order() {
        let context = build_context(&[ranked("first passage", 0), ranked("second passage", 1)], 100);
        let first = context.find("first passage").unwrap();
        let second = context.find("second passage").unwrap();
        assert!(first < second);
        assert!(context.starts_with("[1] "));
        assert!(context.contains("\n[2] "));
    }

    #[test]
    fn test_context_respects_token_budget() {
        let long = (0..50).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let context = build_context(&[ranked(&long, 0), ranked(&long, 1), ranked(&long, 2)], 110);
        // First two fit (100 tokens); the third would exceed the budget.
        assert!(context.contains("[2]"));
        assert!(!context.contains("[3]"));
    }

    #[test]
    fn test_oversized_first_chunk_is_truncated_not_dropped() {
        let long = (0..40).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let context = build_context(&[ranked(&long, 0)], 10);
        assert!(context.contains("[1]"));
        assert!(context.contains("w9"));
        assert!(!context.contains("w10 "));
    }

    #[test]
    fn test_prompt_contains_query_and_context() {
        let prompt = build_prompt("what is rust", "[1] rust is a language\n");
        assert!(prompt.contains("QUESTION: what is rust"));
        assert!(prompt.contains("[1] rust is a language"));
    }
}
