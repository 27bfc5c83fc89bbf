//! Error types for chat turns.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur while processing a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Embedding, ranking or store error.
    #[error("embedding error: {0}")]
    Embedding(#[from] brief_embeddings::EmbeddingError),

    /// Completion API returned a non-success status.
    #[error("completion request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Invalid response from the completion API.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// No API key was configured or found in the environment.
    #[error("no API key configured; set OPENAI_API_KEY or `api_key` in the config file")]
    MissingApiKey,

    /// The question was empty.
    #[error("question is empty")]
    EmptyQuestion,

    /// A pipeline stage did not finish in time.
    #[error("{stage} stage timed out after {elapsed:?}")]
    Timeout { stage: Stage, elapsed: Duration },

    /// The caller cancelled the turn.
    #[error("turn cancelled during {stage} stage")]
    Cancelled { stage: Stage },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two suspension points of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Embedding the question and ranking the store.
    Retrieve,
    /// Waiting for the completion.
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Retrieve => f.write_str("retrieve"),
            Stage::Complete => f.write_str("complete"),
        }
    }
}
