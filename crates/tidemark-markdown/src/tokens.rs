//! Token counting against the cl100k BPE vocabulary.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Above this size, exact BPE encoding is too expensive; fall back to the
/// four-characters-per-token approximation.
pub const EXACT_LIMIT: usize = 500_000;

static BPE: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(err) => {
        warn!(error = %err, "cl100k vocabulary unavailable, using approximation");
        None
    }
});

/// Count tokens: exact for text up to [`EXACT_LIMIT`] characters, otherwise
/// `ceil(len / 4)`.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    if text.len() > EXACT_LIMIT {
        return approximate(text);
    }
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => approximate(text),
    }
}

fn approximate(text: &str) -> usize {
    text.len().div_ceil(4)
}
