//! Configuration for the briefing assistant.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use brief_embeddings::provider::{DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL};

use crate::completion::DEFAULT_CHAT_MODEL;
use crate::context::DEFAULT_WINDOW_CAPACITY;
use crate::error::{ChatError, Result};
use crate::session::DEFAULT_SYSTEM_PROMPT;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Configuration for chat turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// API base URL shared by the embedding and completion endpoints.
    pub base_url: String,

    /// Bearer credential. Usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model used to embed questions.
    pub embedding_model: String,

    /// Model used for completions.
    pub chat_model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Number of article sections retrieved per question.
    pub top_n: usize,

    /// Number of context-bearing prompts kept in the window.
    pub context_window: usize,

    /// Per-stage timeout in milliseconds.
    pub stage_timeout_ms: u64,

    /// System prompt starting every session.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            top_n: 3,
            context_window: DEFAULT_WINDOW_CAPACITY,
            stage_timeout_ms: 60_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ChatConfig {
    /// Parse a TOML configuration. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    /// Apply environment overrides and check that a credential is present.
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`.
    pub fn resolve(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ChatError::MissingApiKey);
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the number of retrieved sections.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the per-stage timeout. Durations shorter than a millisecond fail
    /// validation.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Per-stage timeout.
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    /// Check the values builders and environment overrides may have set.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(ChatError::Config("top_n must be at least 1".to_string()));
        }
        if self.context_window == 0 {
            return Err(ChatError::Config(
                "context_window must be at least 1".to_string(),
            ));
        }
        if self.stage_timeout_ms == 0 {
            return Err(ChatError::Config(
                "stage_timeout_ms must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}
