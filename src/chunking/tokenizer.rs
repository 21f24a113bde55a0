//! Token estimation for size budgets.
//!
//! Every budget decision in the assembler (flush threshold, trailing-buffer
//! floor, overlap carry) uses the same estimate: whitespace-delimited word
//! count. It is cheap, deterministic, and language-agnostic. Enable the
//! `tokenizer-tiktoken` feature when budgets must line up with a hosted
//! model's context math.

/// Count budget tokens by splitting on Unicode whitespace.
#[must_use]
pub fn count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The last `n` budget tokens of `text`, in document order.
///
/// Returns fewer than `n` tokens when the text is shorter; `n == 0` yields
/// an empty slice.
#[must_use]
pub fn tail(text: &str, n: usize) -> Vec<&str> {
    if n == 0 {
        return Vec::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(n);
    words[start..].to_vec()
}

#[cfg(feature = "tokenizer-tiktoken")]
pub mod bpe {
    //! cl100k BPE counts, for callers aligning budgets with hosted models.

    use std::sync::OnceLock;
    use tiktoken_rs::CoreBPE;

    fn encoder() -> &'static CoreBPE {
        static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
        ENCODER.get_or_init(|| {
            tiktoken_rs::cl100k_base().expect("bundled cl100k tables load")
        })
    }

    /// Count BPE tokens in `text` with the cl100k vocabulary.
    #[must_use]
    pub fn count(text: &str) -> usize {
        encoder().encode_with_special_tokens(text).len()
    }
}
