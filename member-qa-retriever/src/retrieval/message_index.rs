//! In-memory semantic index over member messages.
//!
//! The index owns one immutable [`IndexSnapshot`] at a time: the formatted
//! messages and their embeddings, paired by position. Readers clone the
//! current snapshot handle and score against it without holding a lock;
//! [`MessageIndex::build`] constructs a complete replacement off to the side
//! and publishes it in a single pointer swap. Builds are serialized, so at
//! most one is in flight.
//!
//! ## States
//!
//! ```text
//! Empty ──build(≥1 message)──▶ Ready ──build──▶ Empty | Ready
//! ```
//!
//! A build whose records all fail filtering publishes an empty snapshot
//! (the Empty state). A build whose embedding step fails publishes nothing,
//! so the previous snapshot keeps serving queries.

use chrono::{DateTime, Utc};
use half::f16;
use member_qa_embed::{Embedding, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::similarity::rank_top_k;
use crate::error::IndexError;
use crate::message::{Message, RawRecord};
use crate::status::IndexStatus;

/// Whether the index can answer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// No messages; the service is not ready
    Empty,
    /// At least one message with its embedding
    Ready,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexState::Empty => write!(f, "empty"),
            IndexState::Ready => write!(f, "ready"),
        }
    }
}

/// One published version of the index.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    messages: Vec<Message>,
    embeddings: Vec<Embedding>,
    built_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl IndexSnapshot {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn state(&self) -> IndexState {
        if self.messages.is_empty() {
            IndexState::Empty
        } else {
            IndexState::Ready
        }
    }

    /// Number of builds published before and including this one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// Rank stored messages against `question_vector`.
    ///
    /// Takes the `top_k` most similar messages (ties to the earlier message),
    /// then keeps only scores strictly greater than `threshold`. An Empty
    /// snapshot yields an empty result.
    pub fn query(&self, question_vector: &[f16], top_k: usize, threshold: f32) -> RetrievalResult {
        if self.is_empty() {
            return RetrievalResult::default();
        }

        let hits = rank_top_k(question_vector, &self.embeddings, top_k, threshold)
            .into_iter()
            .map(|(idx, score)| ScoredMessage {
                message: self.messages[idx].clone(),
                score,
            })
            .collect();

        RetrievalResult { hits }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub state: IndexState,
    /// Messages now in the index
    pub indexed: usize,
    /// Raw records dropped for lacking a speaker or message
    pub skipped: usize,
    pub generation: u64,
}

/// A message with its similarity to the question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMessage {
    pub message: Message,
    pub score: f32,
}

/// Query hits in descending score order, all strictly above the threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredMessage>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredMessage> {
        self.hits.iter()
    }

    /// Newline-joined canonical message lines, best match first.
    pub fn render(&self) -> String {
        self.hits
            .iter()
            .map(|hit| hit.message.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The shared message index. Cheap to query concurrently; see module docs.
pub struct MessageIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    build_lock: Mutex<()>,
}

impl fmt::Debug for MessageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageIndex")
            .field("provider", &self.embedder.provider_name())
            .finish_non_exhaustive()
    }
}

impl MessageIndex {
    /// Create an index in the Empty state.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            build_lock: Mutex::new(()),
        }
    }

    /// The provider used to embed messages
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Replace the index contents with `records`.
    ///
    /// Records without both a speaker and a message are skipped. If nothing
    /// survives, an empty snapshot is published and the index is Empty.
    /// Otherwise every message is embedded in one batch call and the new
    /// snapshot is published atomically. On embedding failure the previous
    /// snapshot is left untouched and the error is returned.
    pub async fn build(&self, records: Vec<RawRecord>) -> Result<BuildOutcome, IndexError> {
        let _build_guard = self.build_lock.lock().await;

        let total = records.len();
        let messages: Vec<Message> = records
            .into_iter()
            .filter_map(RawRecord::into_message)
            .collect();
        let skipped = total - messages.len();
        let generation = self.snapshot.read().await.generation + 1;

        if skipped > 0 {
            debug!("Skipped {} records without speaker or message", skipped);
        }

        if messages.is_empty() {
            warn!("No messages found in {} records, index is now empty", total);
            self.publish(IndexSnapshot {
                messages,
                embeddings: Vec::new(),
                built_at: Some(Utc::now()),
                generation,
            })
            .await;
            return Ok(BuildOutcome {
                state: IndexState::Empty,
                indexed: 0,
                skipped,
                generation,
            });
        }

        info!("Creating embeddings for {} messages", messages.len());
        let texts: Vec<String> = messages.iter().map(Message::to_string).collect();
        let result = self.embedder.embed_texts(&texts).await?;

        if result.len() != messages.len() {
            return Err(IndexError::EmbeddingCountMismatch {
                messages: messages.len(),
                embeddings: result.len(),
            });
        }

        let indexed = messages.len();
        self.publish(IndexSnapshot {
            messages,
            embeddings: result.embeddings,
            built_at: Some(Utc::now()),
            generation,
        })
        .await;

        info!(
            "Message index ready: {} messages, generation {}",
            indexed, generation
        );
        Ok(BuildOutcome {
            state: IndexState::Ready,
            indexed,
            skipped,
            generation,
        })
    }

    /// Rank messages in the currently published snapshot.
    ///
    /// See [`IndexSnapshot::query`]. Callers that also need the index state
    /// should take one [`snapshot`](Self::snapshot) and query that instead.
    pub async fn query(
        &self,
        question_vector: &[f16],
        top_k: usize,
        threshold: f32,
    ) -> RetrievalResult {
        self.snapshot().await.query(question_vector, top_k, threshold)
    }

    /// Handle to the currently published snapshot
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn state(&self) -> IndexState {
        self.snapshot().await.state()
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == IndexState::Ready
    }

    /// Number of indexed messages
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot().await;
        IndexStatus {
            state: snapshot.state(),
            indexed_messages: snapshot.len(),
            embedding_dimension: self.embedder.embedding_dimension(),
            provider: self.embedder.provider_name().to_string(),
            rebuilds: snapshot.generation(),
            last_built_at: snapshot.built_at(),
        }
    }

    async fn publish(&self, snapshot: IndexSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().await = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use member_qa_embed::MockEmbeddingProvider;

    fn records() -> Vec<RawRecord> {
        vec![
            RawRecord::new("Layla", "Booking a suite for 5 nights in London"),
            RawRecord::new("Sam", "I like pizza"),
            RawRecord {
                user_name: None,
                message: Some("orphan message".to_string()),
            },
        ]
    }

    fn provider() -> MockEmbeddingProvider {
        MockEmbeddingProvider::new(3)
            .with_vector("Layla: Booking a suite for 5 nights in London", vec![1.0, 0.0, 0.0])
            .with_vector("Sam: I like pizza", vec![0.0, 1.0, 0.0])
            .with_vector("Amira: Also booking London", vec![1.0, 0.0, 0.0])
    }

    fn query_vec(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    #[tokio::test]
    async fn test_new_index_is_empty() {
        let index = MessageIndex::new(Arc::new(provider()));
        assert_eq!(index.state().await, IndexState::Empty);
        assert_eq!(index.len().await, 0);

        let result = index.query(&query_vec(&[1.0, 0.0, 0.0]), 10, 0.3).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_build_filters_and_becomes_ready() {
        let index = MessageIndex::new(Arc::new(provider()));
        let outcome = index.build(records()).await.unwrap();

        assert_eq!(outcome.state, IndexState::Ready);
        assert_eq!(outcome.indexed, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.generation, 1);

        let snapshot = index.snapshot().await;
        assert_eq!(snapshot.messages().len(), snapshot.embeddings().len());
        assert_eq!(
            snapshot.messages()[0].to_string(),
            "Layla: Booking a suite for 5 nights in London"
        );
    }

    #[tokio::test]
    async fn test_build_with_no_valid_records_empties_index() {
        let index = MessageIndex::new(Arc::new(provider()));
        index.build(records()).await.unwrap();
        assert!(index.is_ready().await);

        let outcome = index
            .build(vec![RawRecord {
                user_name: Some("Sam".to_string()),
                message: None,
            }])
            .await
            .unwrap();

        assert_eq!(outcome.state, IndexState::Empty);
        assert_eq!(outcome.generation, 2);
        assert_eq!(index.state().await, IndexState::Empty);
        assert!(index.snapshot().await.embeddings().is_empty());
    }

    #[tokio::test]
    async fn test_query_respects_threshold_and_order() {
        let index = MessageIndex::new(Arc::new(provider()));
        index.build(records()).await.unwrap();

        let result = index.query(&query_vec(&[0.9, 0.1, 0.0]), 10, 0.3).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].message.speaker, "Layla");
        assert!(result.hits[0].score > 0.9);

        let everything = index.query(&query_vec(&[0.9, 0.1, 0.0]), 10, -1.0).await;
        assert_eq!(everything.len(), 2);
        assert!(everything.hits[0].score >= everything.hits[1].score);

        let limited = index.query(&query_vec(&[0.9, 0.1, 0.0]), 1, -1.0).await;
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_query_ties_prefer_earlier_message() {
        let index = MessageIndex::new(Arc::new(provider()));
        index
            .build(vec![
                RawRecord::new("Sam", "I like pizza"),
                RawRecord::new("Layla", "Booking a suite for 5 nights in London"),
                RawRecord::new("Amira", "Also booking London"),
            ])
            .await
            .unwrap();

        let result = index.query(&query_vec(&[1.0, 0.0, 0.0]), 10, 0.3).await;
        let speakers: Vec<&str> = result
            .iter()
            .map(|hit| hit.message.speaker.as_str())
            .collect();
        assert_eq!(speakers, vec!["Layla", "Amira"]);
        assert_eq!(
            result.render(),
            "Layla: Booking a suite for 5 nights in London\nAmira: Also booking London"
        );
    }

    #[tokio::test]
    async fn test_rebuild_with_same_input_is_idempotent() {
        let index = MessageIndex::new(Arc::new(provider()));
        let question = query_vec(&[0.5, 0.5, 0.0]);

        index.build(records()).await.unwrap();
        let first = index.query(&question, 10, 0.0).await;
        index.build(records()).await.unwrap();
        let second = index.query(&question, 10, 0.0).await;

        assert_eq!(first, second);
        assert_eq!(index.snapshot().await.generation(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_retains_previous_snapshot() {
        let embedder = provider();
        let index = MessageIndex::new(Arc::new(embedder.clone()));
        index.build(records()).await.unwrap();
        let before = index.snapshot().await;

        embedder.set_failing(true);
        let err = index
            .build(vec![RawRecord::new("Omar", "New message")])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Embedding { .. }));

        let after = index.snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(index.state().await, IndexState::Ready);
        assert_eq!(index.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_are_serialized() {
        let index = Arc::new(MessageIndex::new(Arc::new(MockEmbeddingProvider::new(16))));

        let mut handles = Vec::new();
        for round in 0..8 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                let records = (0..=round)
                    .map(|i| RawRecord::new(format!("member{i}"), format!("message {i}")))
                    .collect();
                index.build(records).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = index.snapshot().await;
        assert_eq!(snapshot.generation(), 8);
        assert_eq!(snapshot.messages().len(), snapshot.embeddings().len());
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let index = MessageIndex::new(Arc::new(provider()));
        let status = index.status().await;
        assert_eq!(status.state, IndexState::Empty);
        assert!(status.last_built_at.is_none());

        index.build(records()).await.unwrap();
        let status = index.status().await;
        assert_eq!(status.state, IndexState::Ready);
        assert_eq!(status.indexed_messages, 2);
        assert_eq!(status.embedding_dimension, 3);
        assert_eq!(status.provider, "mock");
        assert_eq!(status.rebuilds, 1);
        assert!(status.last_built_at.is_some());
    }
}
