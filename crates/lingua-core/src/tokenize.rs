//! Target-language tokenization.
//!
//! Korean needs a morphological analyzer for real word boundaries; until one
//! is plugged in, `WhitespaceTokenizer` splits on whitespace only.

/// Splits target-language text into surface tokens
pub trait TargetTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Splits on Unicode whitespace, punctuation stays attached
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl TargetTokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
