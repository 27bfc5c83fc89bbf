//! Turning article text into store records.

use tracing::{debug, info};

use crate::Embedding;
use crate::chunker::{DEFAULT_OVERLAP, DEFAULT_WORDS_PER_CHUNK, chunk_words};
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::weighted_average;
use crate::store::EmbeddingRecord;
use crate::tokens::TokenCounter;

/// Largest number of tokens sent to the provider in one input.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 200;

/// Chunks articles and embeds each chunk.
pub struct ArticleIndexer<P> {
    provider: P,
    tokens: TokenCounter,
    words_per_chunk: usize,
    overlap: usize,
    max_input_tokens: usize,
}

impl<P> ArticleIndexer<P>
where
    P: EmbeddingProvider,
{
    /// Create an indexer with the default chunk geometry.
    pub fn new(provider: P, tokens: TokenCounter) -> Self {
        Self {
            provider,
            tokens,
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            overlap: DEFAULT_OVERLAP,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
        }
    }

    /// Set the chunk size and the overlap between consecutive chunks.
    pub fn with_chunking(mut self, words_per_chunk: usize, overlap: usize) -> Self {
        self.words_per_chunk = words_per_chunk;
        self.overlap = overlap;
        self
    }

    /// Set the largest input, in tokens, embedded in one request.
    pub fn with_max_input_tokens(mut self, max_input_tokens: usize) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }

    /// Embed a text of any length.
    ///
    /// Texts longer than the input limit are split into token windows,
    /// embedded together, and averaged weighted by token count into one unit
    /// vector.
    pub async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let parts = self.tokens.windows(text, self.max_input_tokens)?;
        if parts.len() <= 1 {
            let response = self.provider.embed(EmbeddingRequest::new(text)).await?;
            return Ok(response.embedding);
        }

        let weights: Vec<f32> = parts.iter().map(|part| part.tokens as f32).collect();
        let requests = parts
            .into_iter()
            .map(|part| EmbeddingRequest::new(part.text))
            .collect();
        let embeddings: Vec<Embedding> = self
            .provider
            .embed_batch(requests)
            .await?
            .into_iter()
            .map(|response| response.embedding)
            .collect();

        debug!("Averaged {} windows into one embedding", embeddings.len());
        weighted_average(&embeddings, &weights)
    }

    /// Produce one record per chunk of `text`, plus a summary record when a
    /// summary is given.
    ///
    /// Chunk records are named `<article>_embedding-<i>` and the summary
    /// record `<article>_embedding-summary`.
    pub async fn index_article(
        &self,
        article_uuid: &str,
        text: &str,
        summary: Option<&str>,
    ) -> Result<Vec<EmbeddingRecord>> {
        if !self.provider.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }
        let chunks = chunk_words(text, self.words_per_chunk, self.overlap)?;
        let mut records = Vec::with_capacity(chunks.len() + 1);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let embedding = self.embed_text(&chunk).await?;
            records.push(EmbeddingRecord::new(
                article_uuid,
                format!("{article_uuid}_embedding-{i}"),
                chunk,
                embedding,
            ));
        }

        if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
            let embedding = self.embed_text(summary).await?;
            records.push(EmbeddingRecord::new(
                article_uuid,
                format!("{article_uuid}_embedding-summary"),
                summary,
                embedding,
            ));
        }

        info!(
            "Indexed article {article_uuid} into {} records",
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddingResponse;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Embeds a text as `[word count, 1.0]`.
    struct WordCountProvider {
        available: bool,
    }

    fn indexer(available: bool) -> ArticleIndexer<WordCountProvider> {
        ArticleIndexer::new(WordCountProvider { available }, TokenCounter::cl100k().unwrap())
    }

    #[async_trait]
    impl EmbeddingProvider for WordCountProvider {
        fn name(&self) -> &str {
            "word-count"
        }

        fn default_model(&self) -> &str {
            "word-count"
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                embedding: vec![request.text.split_whitespace().count() as f32, 1.0],
                model: "word-count".to_string(),
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    #[tokio::test]
    async fn test_index_article_names_records() {
        let indexer = indexer(true).with_chunking(4, 1);
        let records = indexer
            .index_article("a1", "one two three four five six seven", Some("short summary"))
            .await
            .unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.embedding_uuid.as_str()).collect();
        assert_eq!(
            ids,
            vec!["a1_embedding-0", "a1_embedding-1", "a1_embedding-summary"]
        );
        assert_eq!(records[0].text, "one two three four");
        assert_eq!(records[1].text, "four five six seven");
        assert_eq!(records[2].embedding, vec![2.0, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_text_averages_long_input() {
        let indexer = indexer(true).with_max_input_tokens(2);
        let embedding = indexer.embed_text("a b c").await.unwrap();

        // token windows "a b" and " c" embed to [2, 1] and [1, 1], weighted
        // 2:1 -> (5/3, 1), normalized
        let norm = ((5.0f32 / 3.0).powi(2) + 1.0).sqrt();
        assert!((embedding[0] - (5.0 / 3.0) / norm).abs() < 1e-6);
        assert!((embedding[1] - 1.0 / norm).abs() < 1e-6);
    }

    #[test]
    fn test_blank_summary_is_skipped() {
        let indexer = indexer(true);
        let records =
            tokio_test::block_on(indexer.index_article("a1", "body text", Some("  "))).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_unavailable_provider_is_rejected() {
        let result = tokio_test::block_on(indexer(false).index_article("a1", "body text", None));
        assert!(matches!(result, Err(EmbeddingError::ProviderNotConfigured)));
    }
}
