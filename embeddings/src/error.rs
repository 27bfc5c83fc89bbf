//! Error types for the embeddings system.

use std::fmt;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    ApiRequest { status: u16, body: String },

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Malformed embedding literal or store document.
    #[error("parse error at {location}: {message}")]
    Parse {
        location: ParseLocation,
        message: String,
    },

    /// Tokenizer could not be loaded or produced undecodable tokens.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Chunk window configuration that cannot make progress.
    #[error("invalid chunking: step {step} must be smaller than words_per_chunk {words_per_chunk}")]
    InvalidChunking { words_per_chunk: usize, step: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where a parse error was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLocation {
    /// Byte offset into the input text.
    Offset(usize),
    /// Index of a record in a store document or CSV export.
    Record(usize),
    /// Index of an element in an embedding array.
    Element(usize),
}

impl fmt::Display for ParseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseLocation::Offset(offset) => write!(f, "byte {offset}"),
            ParseLocation::Record(index) => write!(f, "record {index}"),
            ParseLocation::Element(index) => write!(f, "element {index}"),
        }
    }
}

impl EmbeddingError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            location: ParseLocation::Offset(offset),
            message: message.into(),
        }
    }

    pub(crate) fn parse_at(location: ParseLocation, message: impl Into<String>) -> Self {
        Self::Parse {
            location,
            message: message.into(),
        }
    }

    /// Re-anchor a parse error raised inside one record to that record.
    pub(crate) fn in_record(self, index: usize) -> Self {
        match self {
            Self::Parse { location, message } => Self::Parse {
                location: ParseLocation::Record(index),
                message: format!("{message} (at {location} of the field)"),
            },
            other => other,
        }
    }
}
