//! # Embeddings
//!
//! Precomputed article embeddings and the retrieval half of a chat turn:
//! loading the store, ranking its records against a query embedding, and
//! producing new records from article text.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  literal / csv ──► EmbeddingStore ──► rank ──► top-N texts      │
//! │                          ▲                       ▲              │
//! │  ArticleIndexer ─────────┘     EmbeddingProvider─┘ (query)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod error;
pub mod freshness;
pub mod indexer;
pub mod literal;
pub mod provider;
pub mod similarity;
pub mod store;
pub mod tokens;

pub use chunker::chunk_words;
pub use error::{EmbeddingError, ParseLocation, Result};
pub use freshness::{filter_recent, load_publication_dates};
pub use indexer::ArticleIndexer;
pub use literal::{normalize_literal, parse_embedding, parse_literal, parse_literal_as};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{ScoredText, cosine_similarity, rank, rank_scored};
pub use store::{EmbeddingRecord, EmbeddingStore};
pub use tokens::{TokenCounter, TokenWindow};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
