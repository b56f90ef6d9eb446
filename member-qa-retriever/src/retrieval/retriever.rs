//! Question → context string.

use member_qa_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::message_index::{IndexSnapshot, MessageIndex, RetrievalResult};
use crate::error::RetrieveError;

/// Default number of messages considered per question.
pub const DEFAULT_TOP_K: usize = 10;

/// Default minimum cosine similarity (exclusive) for a message to count as relevant.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Retrieval policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Embeds questions and renders matching messages as prompt context.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<MessageIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Questions are embedded with the same provider the index was built with.
    pub fn new(index: Arc<MessageIndex>, config: RetrievalConfig) -> Self {
        let embedder = Arc::clone(index.embedder());
        Self {
            index,
            embedder,
            config,
        }
    }

    pub fn index(&self) -> &Arc<MessageIndex> {
        &self.index
    }

    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    /// Context for `question` using the configured `top_k` and threshold.
    ///
    /// Returns `""` when the index is Empty or nothing clears the threshold.
    pub async fn retrieve(&self, question: &str) -> Result<String, RetrieveError> {
        self.retrieve_with(question, self.config.top_k, self.config.threshold)
            .await
    }

    /// Like [`retrieve`](Self::retrieve) with explicit policy values.
    pub async fn retrieve_with(
        &self,
        question: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<String, RetrieveError> {
        Ok(self
            .retrieve_scored(question, top_k, threshold)
            .await?
            .render())
    }

    /// The scored hits behind a context string.
    pub async fn retrieve_scored(
        &self,
        question: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<RetrievalResult, RetrieveError> {
        let snapshot = self.index.snapshot().await;
        self.scored_in(&snapshot, question, top_k, threshold).await
    }

    /// Context for `question` ranked against one pinned `snapshot`.
    ///
    /// A rebuild published while the question is being embedded does not
    /// affect the result, so the caller can rely on the snapshot's state.
    pub async fn retrieve_in(
        &self,
        snapshot: &IndexSnapshot,
        question: &str,
    ) -> Result<String, RetrieveError> {
        Ok(self
            .scored_in(snapshot, question, self.config.top_k, self.config.threshold)
            .await?
            .render())
    }

    async fn scored_in(
        &self,
        snapshot: &IndexSnapshot,
        question: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<RetrievalResult, RetrieveError> {
        if snapshot.is_empty() {
            debug!("Index is empty, skipping question embedding");
            return Ok(RetrievalResult::default());
        }

        let question_vector = self.embedder.embed_text(question).await?;
        let result = snapshot.query(&question_vector, top_k, threshold);
        debug!(
            "Retrieved {} messages above {:.2} (top_k={})",
            result.len(),
            threshold,
            top_k
        );
        Ok(result)
    }
}
