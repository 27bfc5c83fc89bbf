//! Word-window chunking of article text.

use crate::error::{EmbeddingError, Result};

/// Default number of words per chunk.
pub const DEFAULT_WORDS_PER_CHUNK: usize = 100;

/// Default number of words shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 10;

/// Split `text` into windows of `words_per_chunk` words, each overlapping the
/// previous one by `step` words.
///
/// Chunking stops at the first window that reaches the end of the text, so
/// the tail is never emitted twice. A text no longer than the overlap yields
/// a single chunk.
pub fn chunk_words(text: &str, words_per_chunk: usize, step: usize) -> Result<Vec<String>> {
    if step >= words_per_chunk {
        return Err(EmbeddingError::InvalidChunking {
            words_per_chunk,
            step,
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }
    if words.len() <= step {
        return Ok(vec![words.join(" ")]);
    }

    let stride = words_per_chunk - step;
    let mut chunks = Vec::new();
    for start in (0..words.len() - step).step_by(stride) {
        let end = (start + words_per_chunk).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
    }

    Ok(chunks)
}
