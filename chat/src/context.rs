//! Context-bearing prompt assembly and the bounded window that holds it.

use std::collections::VecDeque;

use crate::message::ConversationMessage;

/// Instruction placed before the retrieved article sections.
pub const CONTEXT_PREAMBLE: &str = "Use the following sections from news articles to answer the question. \
If the answer cannot be found in the sections, say that you do not know.";

/// Separator between retrieved sections.
pub const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// Body used when retrieval found nothing.
pub const NO_CONTEXT: &str = "No context was found in the knowledge base.";

/// Default number of context-bearing messages kept.
pub const DEFAULT_WINDOW_CAPACITY: usize = 3;

/// Build the user message that carries the retrieved sections and the
/// question.
pub fn assemble_prompt(texts: &[String], question: &str) -> ConversationMessage {
    let sections = if texts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        texts.join(SECTION_DELIMITER)
    };

    ConversationMessage::user(format!(
        "{CONTEXT_PREAMBLE}\n\nArticle sections:\n\n{sections}\n\nQuestion: {question}"
    ))
}

/// FIFO of the most recent context-bearing messages.
///
/// Pushing into a full window evicts the oldest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    messages: VecDeque<ConversationMessage>,
    capacity: usize,
}

impl ContextWindow {
    /// Create a window holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, returning the evicted one if the window was full.
    pub fn push(&mut self, message: ConversationMessage) -> Option<ConversationMessage> {
        if self.capacity == 0 {
            return Some(message);
        }
        let evicted = if self.messages.len() >= self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
