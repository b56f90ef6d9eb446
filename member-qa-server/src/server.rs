//! HTTP surface: `GET /`, `GET /status`, `POST /ask`.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use member_qa_retriever::{IndexStatus, MessageIndex};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::answer::{AnswerError, AnswerOrchestrator};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: AnswerOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: AnswerOrchestrator) -> Arc<Self> {
        Arc::new(Self { orchestrator })
    }

    fn index(&self) -> &Arc<MessageIndex> {
        self.orchestrator.retriever().index()
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
    pub indexed_messages: usize,
}

/// Errors rendered as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Answer(#[from] AnswerError),

    /// The request body was not a valid `AskRequest`
    #[error(transparent)]
    InvalidRequest(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Answer(AnswerError::Unavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ApiError::Answer(AnswerError::RetrievalFailed | AnswerError::GenerationFailed) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::InvalidRequest(rejection) => (rejection.status(), rejection.body_text()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Router with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/ask", post(ask))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "online".to_string(),
        message: "Member Q&A System is running.".to_string(),
        indexed_messages: state.index().len().await,
    })
}

async fn status(State(state): State<Arc<AppState>>) -> Json<IndexStatus> {
    Json(state.index().status().await)
}

async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.inspect_err(|rejection| {
        debug!("Rejected /ask body: {}", rejection.body_text());
    })?;
    let answer = state.orchestrator.answer(&request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
    }))
}
