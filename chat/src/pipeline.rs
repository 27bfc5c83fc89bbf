//! Two-stage chat turn: retrieve (embed then rank), then complete.
//!
//! Each stage runs under a timeout and is raced against the caller's
//! [`CancellationToken`]. A turn takes the current [`Session`] by reference and
//! hands back the next one, so a failed or cancelled turn leaves the caller's
//! history exactly as it was.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use brief_embeddings::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingStore, OpenAIProvider, ScoredText, rank_scored,
};

use crate::completion::{CompletionClient, OpenAiChatClient};
use crate::config::ChatConfig;
use crate::context::assemble_prompt;
use crate::error::{ChatError, Result, Stage};
use crate::session::Session;

/// Outcome of a successful turn.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Session to pass to the next turn.
    pub session: Session,

    /// Assistant reply.
    pub reply: String,

    /// Sections that were handed to the model, best first.
    pub sources: Vec<ScoredText>,
}

/// Answers questions against a loaded embedding store.
pub struct ChatPipeline<E, C> {
    store: Arc<EmbeddingStore>,
    embedder: E,
    completion: C,
    top_n: usize,
    stage_timeout: Duration,
}

impl ChatPipeline<OpenAIProvider, OpenAiChatClient> {
    /// Build a pipeline talking to OpenAI-compatible endpoints.
    ///
    /// The configuration is validated here, so values set through builders
    /// get the same checks as values read from a file.
    pub fn from_config(store: Arc<EmbeddingStore>, config: &ChatConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().ok_or(ChatError::MissingApiKey)?;
        let http = reqwest::Client::new();

        let embedder = OpenAIProvider::new()
            .with_api_key(api_key.clone())
            .with_base_url(config.base_url.clone())
            .with_model(config.embedding_model.clone())
            .with_client(http.clone());
        let completion = OpenAiChatClient::new(api_key)
            .with_base_url(config.base_url.clone())
            .with_model(config.chat_model.clone())
            .with_temperature(config.temperature)
            .with_client(http);

        Ok(Self::new(store, embedder, completion)
            .with_top_n(config.top_n)
            .with_stage_timeout(config.stage_timeout()))
    }
}

impl<E, C> ChatPipeline<E, C>
where
    E: EmbeddingProvider,
    C: CompletionClient,
{
    /// Create a pipeline retrieving 3 sections per question with a 60s
    /// stage timeout.
    pub fn new(store: Arc<EmbeddingStore>, embedder: E, completion: C) -> Self {
        Self {
            store,
            embedder,
            completion,
            top_n: 3,
            stage_timeout: Duration::from_secs(60),
        }
    }

    /// Set the number of sections retrieved per question.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the timeout applied to each stage.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Embed `question` and rank the store against it.
    pub async fn retrieve(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredText>> {
        run_stage(Stage::Retrieve, self.stage_timeout, cancel, async {
            let response = self.embedder.embed(EmbeddingRequest::new(question)).await?;
            let ranked = rank_scored(self.store.records(), &response.embedding, self.top_n)?;
            Ok::<_, ChatError>(ranked)
        })
        .await
    }

    /// Answer `question` in the context of `session`.
    pub async fn process_turn(
        &self,
        session: &Session,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Turn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let sources = self.retrieve(question, cancel).await?;
        if sources.is_empty() {
            warn!("No sections retrieved for question");
        } else {
            debug!(
                "Retrieved {} sections, best score {:.3}",
                sources.len(),
                sources[0].score
            );
        }

        let texts: Vec<String> = sources.iter().map(|s| s.text.clone()).collect();
        let mut next = session.clone();
        next.push_context(assemble_prompt(&texts, question));
        let messages = next.request_messages();

        let reply = run_stage(
            Stage::Complete,
            self.stage_timeout,
            cancel,
            self.completion.complete(&messages),
        )
        .await?;

        next.record_exchange(question, reply.clone());
        info!(
            "Completed turn with {} request messages via {}",
            messages.len(),
            self.completion.name()
        );

        Ok(Turn {
            session: next,
            reply,
            sources,
        })
    }
}

async fn run_stage<T>(
    stage: Stage,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled { stage }),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout { stage, elapsed: timeout }),
        },
    }
}
