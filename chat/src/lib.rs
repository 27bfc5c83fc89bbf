//! # Chat
//!
//! Context-augmented question answering over the article embedding store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Chat Turn                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  question ──► EmbeddingProvider ──► rank(EmbeddingStore)        │
//! │                                          │                      │
//! │                                          ▼                      │
//! │  Session ──► assemble_prompt ──► ContextWindow ──► request      │
//! │     ▲                                                │          │
//! │     └──── record_exchange ◄── CompletionClient ◄─────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use brief_chat::{ChatConfig, ChatPipeline, Session};
//!
//! let config = ChatConfig::default().resolve(|name| std::env::var(name).ok())?;
//! let store = Arc::new(EmbeddingStore::load("article_embeddings.csv").await?);
//! let pipeline = ChatPipeline::from_config(store, &config)?;
//!
//! let session = Session::new(&config.system_prompt, config.context_window);
//! let turn = pipeline
//!     .process_turn(&session, "What happened to rates?", &CancellationToken::new())
//!     .await?;
//! println!("{}", turn.reply);
//! ```

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod session;
pub mod summarize;

pub use completion::{CompletionClient, OpenAiChatClient};
pub use config::ChatConfig;
pub use context::{ContextWindow, assemble_prompt};
pub use error::{ChatError, Result, Stage};
pub use message::{ConversationMessage, Role};
pub use pipeline::{ChatPipeline, Turn};
pub use session::Session;
pub use summarize::{ArticleSummarizer, ArticleSummary};

// Re-export for callers that only depend on this crate.
pub use tokio_util::sync::CancellationToken;
