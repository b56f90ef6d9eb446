//! # member-qa-server
//!
//! HTTP question-answering service over member messages. On startup it
//! fetches the member message feed, embeds every message into an in-memory
//! index, and then answers natural-language questions by retrieving the most
//! relevant messages and asking a generation model to answer from them.
//!
//! ## Architecture
//!
//! - [`member_qa_retriever`] owns ingestion, the shared index and retrieval
//! - [`member_qa_embed`] produces the vectors
//! - [`generation`] wraps the text generation backend
//! - [`answer`] glues retrieval and generation together
//! - [`server`] exposes the HTTP API
//!
//! ## Endpoints
//!
//! | Method | Path      | Response                                              |
//! |--------|-----------|-------------------------------------------------------|
//! | GET    | `/`       | `{"status": "online", "message": ..., "indexed_messages": n}` |
//! | GET    | `/status` | index state, size, provider and last build time       |
//! | POST   | `/ask`    | `{"question": ...}` → `{"answer": ...}`               |
//!
//! `POST /ask` returns 503 until the index holds at least one message and 500
//! with a generic `detail` when retrieval or generation fails.
//!
//! ## Quick Start
//!
//! ```bash
//! GEMINI_API_KEY=... member-qa-server --bind 127.0.0.1:8000
//! curl -s localhost:8000/ask -H 'content-type: application/json' \
//!   -d '{"question": "When is Layla planning her trip to London?"}'
//! ```

pub mod answer;
pub mod config;
pub mod generation;
pub mod server;

pub use answer::{Answer, AnswerError, AnswerKind, AnswerOrchestrator};
pub use config::{ConfigError, ServerConfig};
pub use server::{AppState, router};

use anyhow::{Context, Result};
use member_qa_embed::FastEmbedProvider;
use member_qa_retriever::{
    MessageIndex, Retriever,
    ingest::{HttpMessageSource, MessageSource, refresh_index},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use generation::GeminiGenerator;

/// Rebuild `index` from `source` every `period`, forever.
///
/// Failed refreshes are logged by [`refresh_index`] and leave the current
/// index in place; the next tick tries again.
pub fn spawn_refresh_task(
    source: Arc<dyn MessageSource>,
    index: Arc<MessageIndex>,
    limit: usize,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = refresh_ticker(period);
        // The first tick completes immediately; startup already did that refresh
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Ok(outcome) = refresh_index(source.as_ref(), &index, limit).await {
                info!(
                    "Periodic refresh indexed {} messages (generation {})",
                    outcome.indexed, outcome.generation
                );
            }
        }
    })
}

/// Interval driving periodic refreshes.
///
/// A rebuild that overruns `period` pushes the next one back by a full
/// period instead of firing the missed ticks back to back.
fn refresh_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Run the Q&A server until Ctrl-C.
///
/// Loads the embedding model, performs the initial fetch and index build,
/// then serves HTTP on `config.bind_addr`. A failed initial fetch is not
/// fatal: the server starts with an Empty index and `/ask` answers 503.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    config.validate()?;
    info!("Starting member Q&A server");

    let embedder = FastEmbedProvider::create(config.embedding.clone())
        .await
        .context("Failed to load embedding model")?;
    let index = Arc::new(MessageIndex::new(Arc::new(embedder)));

    let source: Arc<dyn MessageSource> = Arc::new(HttpMessageSource::new(
        &config.source.url,
        config.source.timeout(),
    )?);
    if let Err(e) = refresh_index(source.as_ref(), &index, config.source.limit).await {
        warn!("Starting with an empty index: {}", e);
    }

    let refresh_task = config.refresh_interval().map(|period| {
        info!("Refreshing member messages every {:?}", period);
        spawn_refresh_task(
            Arc::clone(&source),
            Arc::clone(&index),
            config.source.limit,
            period,
        )
    });

    let generator = GeminiGenerator::from_config(&config.generation)?;
    let retriever = Retriever::new(Arc::clone(&index), config.retrieval);
    let orchestrator = AnswerOrchestrator::new(retriever, Arc::new(generator));
    let app = router(AppState::new(orchestrator));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(task) = refresh_task {
        task.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
