//! Token estimation.
//!
//! Uses a character-based heuristic: ~4 characters per token. Only the
//! ingestion budget decision depends on it, so an approximation is enough.

/// Counts tokens for budget decisions.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes of UTF-8. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// The default [`TokenCounter`], backed by [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}
