//! End-to-end chat turns against mocked OpenAI-compatible endpoints.

use std::sync::Arc;

use brief_chat::{CancellationToken, ChatConfig, ChatError, ChatPipeline, Role, Session};
use brief_embeddings::EmbeddingStore;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORE: &str = "[\
    {'article_uuid': 'econ-1', 'embedding_uuid': 'econ-1_embedding-0', 'text': 'The central bank raised rates by 25 basis points.', 'embedding': '[1.0, 0.0, 0.0]'}, \
    {'article_uuid': 'econ-2', 'embedding_uuid': 'econ-2_embedding-0', 'text': 'Crude oil slid as demand weakened.', 'embedding': '[0.0, 1.0, 0.0]'}, \
    {'article_uuid': 'econ-3', 'embedding_uuid': 'econ-3_embedding-0', 'text': 'Bond yields climbed after the rate decision.', 'embedding': '[0.8, 0.0, 0.6]'}\
]";

async fn mock_embeddings(server: &MockServer, input: &str, embedding: Value) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": input})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": embedding, "index": 0}],
            "model": "text-embedding-ada-002"
        })))
        .mount(server)
        .await;
}

async fn mock_completion(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ChatConfig {
    ChatConfig::default()
        .with_top_n(2)
        .resolve(|name| match name {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_BASE_URL" => Some(format!("{}/v1", server.uri())),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_turn_round_trip() {
    let server = MockServer::start().await;
    mock_embeddings(&server, "What did the central bank do?", json!([1.0, 0.0, 0.0])).await;
    mock_completion(&server, "It raised rates by a quarter point.").await;

    let config = config(&server);
    let store = Arc::new(EmbeddingStore::from_literal(STORE).unwrap());
    let pipeline = ChatPipeline::from_config(store, &config).unwrap();
    let session = Session::new(&config.system_prompt, config.context_window);

    let turn = pipeline
        .process_turn(
            &session,
            "What did the central bank do?",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(turn.reply, "It raised rates by a quarter point.");
    let ids: Vec<&str> = turn
        .sources
        .iter()
        .map(|s| s.embedding_uuid.as_str())
        .collect();
    assert_eq!(ids, vec!["econ-1_embedding-0", "econ-3_embedding-0"]);

    let requests = server.received_requests().await.unwrap();
    let completion: Value = requests
        .iter()
        .find(|r| r.url.path() == "/v1/chat/completions")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    let messages = completion["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    let context = messages[0]["content"].as_str().unwrap();
    assert!(context.contains("The central bank raised rates by 25 basis points."));
    assert!(context.contains("Bond yields climbed after the rate decision."));
    assert!(!context.contains("Crude oil"));
    assert_eq!(messages[1]["role"], "system");
    assert_eq!(completion["model"], "gpt-3.5-turbo");

    let history = turn.session.messages();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].role, Role::Assistant);
}

#[tokio::test]
async fn test_failed_completion_keeps_previous_session() {
    let server = MockServer::start().await;
    mock_embeddings(&server, "Why did oil fall?", json!([0.0, 1.0, 0.0])).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let config = config(&server);
    let store = Arc::new(EmbeddingStore::from_literal(STORE).unwrap());
    let pipeline = ChatPipeline::from_config(store, &config).unwrap();
    let session = Session::new(&config.system_prompt, config.context_window);

    let err = pipeline
        .process_turn(&session, "Why did oil fall?", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Api { status: 503, .. }));
    assert!(session.messages_with_context().is_empty());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn test_embedding_failure_stops_before_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server);
    let store = Arc::new(EmbeddingStore::from_literal(STORE).unwrap());
    let pipeline = ChatPipeline::from_config(store, &config).unwrap();

    let err = pipeline
        .process_turn(&Session::default(), "Anything new?", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChatError::Embedding(brief_embeddings::EmbeddingError::ApiRequest { status: 401, .. })
    ));
}
