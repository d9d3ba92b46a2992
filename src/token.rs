//! Token counting for chunk budgets.

use crate::error::{Result, SubtransError};
use tiktoken_rs::CoreBPE;

/// Counts tokens in a piece of text. Implementations must be
/// deterministic and pure; the chunker recomputes counts freely.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Token counter over the `cl100k_base` byte-pair encoding.
pub struct Cl100kCounter {
    bpe: CoreBPE,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| SubtransError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Whitespace-separated word count. Cheap and reproducible, which makes
/// chunker behavior easy to predict in tests.
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_counter() {
        let counter = WhitespaceCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("one two  three\nfour"), 4);
    }

    #[test]
    fn test_cl100k_counter_is_deterministic() {
        let counter = Cl100kCounter::new().unwrap();
        let text = "1\n00:00:01,000 --> 00:00:04,000\nHello world!\n";
        let n = counter.count(text);
        assert!(n > 0);
        assert_eq!(counter.count(text), n);
    }
}
