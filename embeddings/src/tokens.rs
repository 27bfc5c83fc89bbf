//! Token counting and token windows using the `cl100k_base` encoding.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{EmbeddingError, Result};

/// A slice of text together with the number of tokens it encodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWindow {
    pub text: String,
    pub tokens: usize,
}

/// Shared `cl100k_base` tokenizer.
///
/// Loading the encoding is expensive, so build one and clone it.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// Load the `cl100k_base` encoding used by the OpenAI embedding and chat models.
    pub fn cl100k() -> Result<Self> {
        let bpe =
            tiktoken_rs::cl100k_base().map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Number of tokens `text` encodes to.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into consecutive windows of at most `max_tokens` tokens.
    ///
    /// A window is widened past the limit when its last token ends inside a
    /// multi-byte character, so every window decodes to valid text and the
    /// windows concatenate back to `text`.
    pub fn windows(&self, text: &str, max_tokens: usize) -> Result<Vec<TokenWindow>> {
        let tokens = self.bpe.encode_ordinary(text);
        let max_tokens = max_tokens.max(1);
        let mut windows = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let mut end = (start + max_tokens).min(tokens.len());
            let text = loop {
                match self.bpe.decode(tokens[start..end].to_vec()) {
                    Ok(text) => break text,
                    Err(_) if end < tokens.len() => end += 1,
                    Err(e) => return Err(EmbeddingError::Tokenizer(e.to_string())),
                }
            };
            windows.push(TokenWindow {
                text,
                tokens: end - start,
            });
            start = end;
        }

        Ok(windows)
    }
}
