//! Article summaries, advisor notes and topic categories produced by the
//! completion model.
//!
//! Articles longer than the model's comfortable input are first condensed:
//! the text is halved, each half is summarized, and the halves are joined
//! until the result fits.

use serde::Deserialize;
use tracing::{debug, warn};

use brief_embeddings::{TokenCounter, parse_literal_as};

use crate::completion::CompletionClient;
use crate::error::{ChatError, Result};
use crate::message::ConversationMessage;

/// Largest article, in tokens, handed to the summary prompt.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 3500;

/// Default length of a summary, in sentences.
pub const DEFAULT_SUMMARY_SENTENCES: usize = 3;

/// Topics an article can be filed under.
pub const CATEGORIES: &[&str] = &[
    "Business and Economics",
    "Politics and Government",
    "Technology and Innovation",
    "Environment and Sustainability",
    "Culture and Society",
    "Science and Health",
    "Education and Learning",
    "International Relations and Diplomacy",
    "Sports and Entertainment",
    "History and Philosophy",
];

/// Category used when the model answers with a topic not in [`CATEGORIES`].
pub const OTHER_CATEGORY: &str = "Other";

const SECTION_SYSTEM_PROMPT: &str =
    "You shorten news articles to about half their length while keeping the detail.";

const SUMMARY_SYSTEM_PROMPT: &str = "You help prepare a daily news briefing. You summarise \
articles and add the view of an expert advisor. You reply with a single Python dictionary \
and nothing else.";

const CATEGORY_SYSTEM_PROMPT: &str = "You file news articles under one topic from a fixed list. \
You reply with the topic exactly as it is written in the list.";

/// Summary of one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub summary: String,
    /// Two or three sentences of background from an expert's point of view.
    pub advisor_note: String,
}

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
    advisor: String,
}

/// Summarizes and categorizes articles with a [`CompletionClient`].
pub struct ArticleSummarizer<C> {
    client: C,
    tokens: TokenCounter,
    max_input_tokens: usize,
    sentences: usize,
}

impl<C> ArticleSummarizer<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, tokens: TokenCounter) -> Self {
        Self {
            client,
            tokens,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            sentences: DEFAULT_SUMMARY_SENTENCES,
        }
    }

    pub fn with_max_input_tokens(mut self, max_input_tokens: usize) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }

    pub fn with_sentences(mut self, sentences: usize) -> Self {
        self.sentences = sentences;
        self
    }

    /// Shrink `text` until it fits in the summary prompt.
    ///
    /// Each round summarizes both halves of the text and joins the results.
    /// A round that does not reduce the token count is an error.
    pub async fn condense(&self, text: &str) -> Result<String> {
        let mut text = text.to_string();
        let mut tokens = self.tokens.count(&text);

        while tokens > self.max_input_tokens {
            let (first, second) = split_in_half(&text);
            let first = self.summarize_section(first).await?;
            let second = self.summarize_section(second).await?;

            let combined = format!("{first}\n\n{second}");
            let combined_tokens = self.tokens.count(&combined);
            if combined_tokens >= tokens {
                return Err(ChatError::InvalidResponse(format!(
                    "section summaries did not shorten the article ({tokens} -> {combined_tokens} tokens)"
                )));
            }

            debug!("Condensed article from {tokens} to {combined_tokens} tokens");
            text = combined;
            tokens = combined_tokens;
        }

        Ok(text)
    }

    async fn summarize_section(&self, text: &str) -> Result<String> {
        let messages = [
            ConversationMessage::system(SECTION_SYSTEM_PROMPT),
            ConversationMessage::user(format!(
                "Summarise the following text to about half its length. Keep the detail and \
                 output only the summary.\n\nText: {text}"
            )),
        ];
        self.client.complete(&messages).await
    }

    /// Summarize an article that already fits the input limit.
    ///
    /// The model replies with a dictionary literal holding `summary` and
    /// `advisor`; text around the dictionary is ignored.
    pub async fn summarize(&self, title: Option<&str>, text: &str) -> Result<ArticleSummary> {
        let title_line = title
            .map(|title| format!("Title: {title}\n"))
            .unwrap_or_default();
        let messages = [
            ConversationMessage::system(SUMMARY_SYSTEM_PROMPT),
            ConversationMessage::user(format!(
                "Summarise this article in {sentences} detailed sentences covering what it is \
                 about, its main points and its conclusion, so the reader can decide whether to \
                 read it in full.\n\nThen, as an expert advisor, add 2-3 sentences of context \
                 such as related history, policy or trends.\n\n{title_line}Article body: \
                 {text}\n\nReply only with a dictionary of the form:\n\
                 {{\"summary\": \"...\", \"advisor\": \"...\"}}",
                sentences = self.sentences,
            )),
        ];

        let reply = self.client.complete(&messages).await?;
        parse_summary_reply(&reply)
    }

    /// File `text` under one of [`CATEGORIES`], or [`OTHER_CATEGORY`].
    pub async fn categorize(&self, text: &str) -> Result<String> {
        let topics = CATEGORIES.join("\n");
        let messages = [
            ConversationMessage::system(CATEGORY_SYSTEM_PROMPT),
            ConversationMessage::user(format!(
                "Topics:\n{topics}\n\nArticle: {text}\n\nWhich topic does the article belong to?"
            )),
        ];

        let reply = self.client.complete(&messages).await?;
        let answer = reply.trim().trim_matches(['"', '.']);
        match CATEGORIES.iter().find(|c| c.eq_ignore_ascii_case(answer)) {
            Some(category) => Ok((*category).to_string()),
            None => {
                warn!("Model answered unknown category {answer:?}, using {OTHER_CATEGORY}");
                Ok(OTHER_CATEGORY.to_string())
            }
        }
    }
}

fn split_in_half(text: &str) -> (&str, &str) {
    let mut mid = text.len() / 2;
    while !text.is_char_boundary(mid) {
        mid += 1;
    }
    text.split_at(mid)
}

fn parse_summary_reply(reply: &str) -> Result<ArticleSummary> {
    let literal = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(ChatError::InvalidResponse(format!(
                "summary reply holds no dictionary: {reply}"
            )));
        }
    };

    let parsed: SummaryReply = parse_literal_as(literal)
        .map_err(|e| ChatError::InvalidResponse(format!("unreadable summary reply: {e}")))?;
    Ok(ArticleSummary {
        summary: parsed.summary,
        advisor_note: parsed.advisor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    type Reply = Box<dyn Fn(&[ConversationMessage]) -> String + Send + Sync>;

    /// Answers with `reply` and records every request.
    struct ScriptedClient {
        reply: Reply,
        requests: Mutex<Vec<Vec<ConversationMessage>>>,
    }

    impl ScriptedClient {
        fn new(reply: impl Fn(&[ConversationMessage]) -> String + Send + Sync + 'static) -> Self {
            Self {
                reply: Box::new(reply),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ConversationMessage]) -> Result<String> {
            self.requests.lock().unwrap().push(messages.to_vec());
            Ok((self.reply)(messages))
        }
    }

    fn summarizer(client: ScriptedClient) -> ArticleSummarizer<ScriptedClient> {
        ArticleSummarizer::new(client, TokenCounter::cl100k().unwrap())
    }

    fn words(n: usize) -> String {
        vec!["inflation"; n].join(" ")
    }

    #[tokio::test]
    async fn test_condense_leaves_short_text_alone() {
        let summarizer = summarizer(ScriptedClient::new(|_| unreachable!()));
        let text = summarizer.condense("Rates rose.").await.unwrap();
        assert_eq!(text, "Rates rose.");
    }

    #[tokio::test]
    async fn test_condense_summarizes_both_halves() {
        let summarizer =
            summarizer(ScriptedClient::new(|_| "short".to_string())).with_max_input_tokens(5);

        let text = summarizer.condense(&words(20)).await.unwrap();

        assert_eq!(text, "short\n\nshort");
        let requests = summarizer.client.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0][0], ConversationMessage::system(SECTION_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_condense_fails_when_summaries_grow() {
        let summarizer = summarizer(ScriptedClient::new(|messages| {
            format!("{} and more", messages[1].content)
        }))
        .with_max_input_tokens(5);

        let result = summarizer.condense(&words(20)).await;
        assert!(matches!(result, Err(ChatError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_summarize_reads_dictionary_reply() {
        let summarizer = summarizer(ScriptedClient::new(|_| {
            "```python\n{'summary': 'The central bank raised rates.', \
             'advisor': \"Markets had priced it in.\"}\n```"
                .to_string()
        }))
        .with_sentences(5);

        let summary = summarizer
            .summarize(Some("Rates up"), "The bank raised rates today.")
            .await
            .unwrap();

        assert_eq!(
            summary,
            ArticleSummary {
                summary: "The central bank raised rates.".to_string(),
                advisor_note: "Markets had priced it in.".to_string(),
            }
        );
        let requests = summarizer.client.requests.lock().unwrap();
        let prompt = &requests[0][1].content;
        assert!(prompt.contains("in 5 detailed sentences"));
        assert!(prompt.contains("Title: Rates up\n"));
    }

    #[tokio::test]
    async fn test_summarize_rejects_free_text() {
        let summarizer = summarizer(ScriptedClient::new(|_| "Rates went up.".to_string()));
        let result = summarizer.summarize(None, "text").await;
        assert!(matches!(result, Err(ChatError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_categorize_matches_known_topics() {
        let summarizer =
            summarizer(ScriptedClient::new(|_| " business and economics.\n".to_string()));
        assert_eq!(
            summarizer.categorize("text").await.unwrap(),
            "Business and Economics"
        );
    }

    #[tokio::test]
    async fn test_categorize_falls_back_to_other() {
        let summarizer = summarizer(ScriptedClient::new(|_| "Weather".to_string()));
        assert_eq!(summarizer.categorize("text").await.unwrap(), OTHER_CATEGORY);
    }

    #[test]
    fn test_split_in_half_respects_char_boundaries() {
        let (first, second) = split_in_half("ab€cd");
        assert_eq!(format!("{first}{second}"), "ab€cd");
        assert!(!first.is_empty() && !second.is_empty());
    }
}
