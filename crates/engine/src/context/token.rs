//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text, which is plenty for budget enforcement.

use groundsql_core::context::Fragment;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a fragment including per-fragment overhead.
///
/// Each fragment costs ~2 tokens of overhead for its layer tag and
/// delimiters in the rendered context.
pub fn estimate_fragment_tokens(fragment: &Fragment) -> usize {
    2 + estimate_tokens(&fragment.text)
}
