//! HTTP-level tests for the Q&A service
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`, backed by
//! the mock embedding provider and a scripted generator:
//! - Answering from relevant member messages
//! - 503 before any message is indexed
//! - Canned answer when nothing is relevant
//! - Generic 500 when generation fails, with the index untouched
//! - Malformed request bodies answered with a JSON `detail`

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use member_qa_embed::MockEmbeddingProvider;
use member_qa_retriever::{
    MessageIndex, RawRecord, RetrievalConfig, Retriever,
    ingest::{StaticMessageSource, refresh_index},
};
use member_qa_server::answer::NO_RELEVANT_CONTEXT_ANSWER;
use member_qa_server::generation::{ScriptedGenerator, ScriptedReply};
use member_qa_server::{AnswerOrchestrator, AppState, router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const LAYLA: &str = "Layla: Booking a suite for 5 nights in London";
const SAM: &str = "Sam: I like pizza";
const TRIP: &str = "When is Layla planning her trip to London?";
const MARS: &str = "What is the weather on Mars?";

fn embedder() -> MockEmbeddingProvider {
    MockEmbeddingProvider::new(3)
        .with_vector(LAYLA, vec![1.0, 0.0, 0.0])
        .with_vector(SAM, vec![0.0, 1.0, 0.0])
        .with_vector(TRIP, vec![0.9, 0.1, 0.0])
        .with_vector(MARS, vec![0.0, 0.0, 1.0])
}

async fn app_with(
    records: Vec<RawRecord>,
    generator: ScriptedGenerator,
) -> (axum::Router, Arc<MessageIndex>) {
    let index = Arc::new(MessageIndex::new(Arc::new(embedder())));
    // An empty feed is what the service sees when the fetch returned nothing
    let _ = refresh_index(&StaticMessageSource::new(records), &index, 5000).await;

    let retriever = Retriever::new(Arc::clone(&index), RetrievalConfig::default());
    let orchestrator = AnswerOrchestrator::new(retriever, Arc::new(generator));
    (router(AppState::new(orchestrator)), index)
}

fn seeded() -> Vec<RawRecord> {
    vec![
        RawRecord::new("Layla", "Booking a suite for 5 nights in London"),
        RawRecord::new("Sam", "I like pizza"),
    ]
}

async fn ask(app: axum::Router, question: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "question": question }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_raw(app: axum::Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_root_reports_indexed_messages() {
    let (app, _) = app_with(seeded(), ScriptedGenerator::new("unused")).await;
    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "online",
            "message": "Member Q&A System is running.",
            "indexed_messages": 2
        })
    );
}

#[tokio::test]
async fn test_status_endpoint() {
    let (app, _) = app_with(seeded(), ScriptedGenerator::new("unused")).await;
    let (status, body) = get(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["indexed_messages"], 2);
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["rebuilds"], 1);
}

#[tokio::test]
async fn test_ask_answers_from_relevant_messages() {
    let generator = ScriptedGenerator::new("").with_reply(ScriptedReply::Text(
        "Layla needs a suite for five nights in London.".to_string(),
    ));
    let (app, _) = app_with(seeded(), generator.clone()).await;

    let (status, body) = ask(app, TRIP).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "answer": "Layla needs a suite for five nights in London." })
    );

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(LAYLA));
}

#[tokio::test]
async fn test_ask_before_index_ready_is_503() {
    let generator = ScriptedGenerator::new("unused");
    let (app, _) = app_with(Vec::new(), generator.clone()).await;

    let (status, body) = ask(app, TRIP).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({ "detail": "Service is unavailable. Data store is not initialized." })
    );
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_ask_without_relevant_messages_gets_canned_answer() {
    let generator = ScriptedGenerator::new("unused");
    let (app, _) = app_with(seeded(), generator.clone()).await;

    let (status, body) = ask(app, MARS).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": NO_RELEVANT_CONTEXT_ANSWER }));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_generation_timeout_is_generic_500() {
    let generator = ScriptedGenerator::new("").with_reply(ScriptedReply::Timeout);
    let (app, index) = app_with(seeded(), generator).await;
    let before = index.snapshot().await;

    let (status, body) = ask(app.clone(), TRIP).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "detail": "Error generating answer. Please try again later." })
    );

    assert!(Arc::ptr_eq(&before, &index.snapshot().await));
    let (status, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexed_messages"], 2);
}

#[tokio::test]
async fn test_provider_rejection_is_generic_500() {
    let generator = ScriptedGenerator::new("").with_reply(ScriptedReply::Status(403));
    let (app, _) = app_with(seeded(), generator).await;

    let (status, body) = ask(app, TRIP).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(!detail.contains("403"));
    assert!(!detail.contains("scripted"));
}

#[tokio::test]
async fn test_ask_without_question_field_is_422_json() {
    let generator = ScriptedGenerator::new("unused");
    let (app, _) = app_with(seeded(), generator.clone()).await;

    let (status, body) = post_raw(app, r#"{"query": "Who likes pizza?"}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("question"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_ask_with_unparseable_body_is_400_json() {
    let generator = ScriptedGenerator::new("unused");
    let (app, _) = app_with(seeded(), generator.clone()).await;

    let (status, body) = post_raw(app, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_ask_without_json_content_type_is_415_json() {
    let (app, _) = app_with(seeded(), ScriptedGenerator::new("unused")).await;

    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .body(Body::from(json!({ "question": TRIP }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].is_string());
}
