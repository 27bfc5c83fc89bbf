//! Conversation state carried from one turn to the next.
//!
//! A session keeps two histories side by side:
//!
//! - `messages_with_context`: the last few context-bearing prompts (retrieved
//!   sections plus question), bounded by a [`ContextWindow`];
//! - `messages`: the system prompt followed by every raw question and reply,
//!   unbounded.
//!
//! The completion request sends the window first, then the raw history.

use crate::context::ContextWindow;
use crate::message::ConversationMessage;

/// Default system prompt for the briefing assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a chatbot on a page which shows summaries of news articles. \
Your job is to answer questions that the user has about the articles. \
You will be given sections from the articles which may be related to help you answer their question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    messages_with_context: ContextWindow,
    messages: Vec<ConversationMessage>,
}

impl Session {
    /// Start a session with the given system prompt and window capacity.
    pub fn new(system_prompt: impl Into<String>, window_capacity: usize) -> Self {
        Self {
            messages_with_context: ContextWindow::new(window_capacity),
            messages: vec![ConversationMessage::system(system_prompt)],
        }
    }

    /// Context-bearing prompts currently in the window, oldest first.
    pub fn messages_with_context(&self) -> &ContextWindow {
        &self.messages_with_context
    }

    /// System prompt plus raw user and assistant turns.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Add a context-bearing prompt to the window.
    pub fn push_context(&mut self, prompt: ConversationMessage) {
        self.messages_with_context.push(prompt);
    }

    /// Record a finished exchange in the raw history.
    pub fn record_exchange(&mut self, question: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ConversationMessage::user(question));
        self.messages.push(ConversationMessage::assistant(reply));
    }

    /// Messages to send to the completion endpoint: the context window
    /// followed by the raw history.
    pub fn request_messages(&self) -> Vec<ConversationMessage> {
        self.messages_with_context
            .iter()
            .chain(self.messages.iter())
            .cloned()
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, crate::context::DEFAULT_WINDOW_CAPACITY)
    }
}
