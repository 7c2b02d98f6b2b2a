//! Fixed-size overlapping token windows over extracted document text.
//!
//! Tokens are whitespace-split words. The same counting is used wherever
//! the pipeline truncates text by length (embedding input, generation
//! context), so chunk token counts and budget math stay consistent.

use crate::config::ChunkingConfig;

/// One window of the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenChunk {
    /// 0-based, contiguous per document.
    pub seq: usize,
    pub text: String,
    pub tokens: usize,
}

/// Count tokens the way the chunker does.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate `text` to at most `budget` tokens.
pub fn truncate_tokens(text: &str, budget: usize) -> String {
    text.split_whitespace()
        .take(budget)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `text` into overlapping windows of `config.window` tokens,
/// advancing `window - stride` tokens each step.
///
/// Empty text or a zero window yields an empty sequence rather than an
/// error. The last window may be shorter than `window` but is never empty.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TokenChunk> {
    if config.window == 0 {
        return Vec::new();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    // A stride >= window would re-read the same window forever.
    let step = config.window.saturating_sub(config.stride).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut seq = 0usize;

    while start < words.len() {
        let end = (start + config.window).min(words.len());
        let window = &words[start..end];
        chunks.push(TokenChunk {
            seq,
            text: window.join(" "),
            tokens: window.len(),
        });
        if end == words.len() {
            break;
        }
        start += step;
        seq += 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn cfg(window: usize, stride: usize) -> ChunkingConfig {
        ChunkingConfig { window, stride }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk_text("", &cfg(500, 100)).is_empty());
        assert!(chunk_text("   \n\t  ", &cfg(500, 100)).is_empty());
    }

    #[test]
    fn test_zero_window_yields_no_chunks() {
        assert!(chunk_text("some words here", &cfg(0, 100)).is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = chunk_text("one two three", &cfg(500, 100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].tokens, 3);
        assert_eq!(chunks[0].text, "one two three");
    }

    #[test]
    fn test_1200_tokens_window_500_stride_100() {
        // Windows advance by 400: [0:500], [400:900], [800:1200].
        let text = words(1200);
        let chunks = chunk_text(&text, &cfg(500, 100));

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            chunks.iter().map(|c| c.tokens).collect::<Vec<_>>(),
            vec![500, 500, 400]
        );
        assert!(chunks[0].text.starts_with("w0 "));
        assert!(chunks[0].text.ends_with(" w499"));
        assert!(chunks[1].text.starts_with("w400 "));
        assert!(chunks[1].text.ends_with(" w899"));
        assert!(chunks[2].text.starts_with("w800 "));
        assert!(chunks[2].text.ends_with(" w1199"));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = words(1234);
        let a = chunk_text(&text, &cfg(500, 100));
        let b = chunk_text(&text, &cfg(500, 100));
        assert_eq!(a, b);
    }

    #[test]
    fn test_windows_cover_text_without_gaps() {
        let text = words(977);
        let config = cfg(100, 25);
        let chunks = chunk_text(&text, &config);

        // Each window starts at seq * (window - stride); consecutive windows
        // must overlap or touch, and the last must reach the final word.
        let step = config.window - config.stride;
        for c in &chunks {
            let start = c.seq * step;
            assert!(c.text.starts_with(&format!("w{start} ")) || c.text == format!("w{start}"));
        }
        let last = chunks.last().unwrap();
        assert!(last.text.ends_with("w976"));
        assert!(last.tokens > 0);
    }

    #[test]
    fn test_stride_ge_window_still_terminates() {
        let text = words(10);
        let chunks = chunk_text(&text, &cfg(3, 5));
        // Degenerate config advances one token at a time.
        assert_eq!(chunks.len(), 8);
        assert_eq!(chunks.last().unwrap().tokens, 3);
    }

    #[test]
    fn test_token_count_matches_chunker() {
        assert_eq!(token_count("a  b\tc\nd"), 4);
        assert_eq!(token_count(""), 0);
    }

    #[test]
    fn test_truncate_tokens() {
        assert_eq!(truncate_tokens("a b c d", 2), "a b");
        assert_eq!(truncate_tokens("a b", 10), "a b");
        assert_eq!(truncate_tokens("a b", 0), "");
    }
}
