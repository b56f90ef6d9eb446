//! Deterministic in-process embedding provider for tests and offline runs.
//!
//! Texts embed to a hashed bag-of-words vector unless an explicit vector was
//! registered for that exact text. The provider can be switched into a
//! failing mode at any time to exercise error paths in callers.

use crate::error::{EmbedError, Result};
use crate::provider::{Embedding, EmbeddingProvider, EmbeddingResult, to_f16_embeddings};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock provider that never loads a model.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    overrides: HashMap<String, Embedding>,
    failing: Arc<AtomicBool>,
    texts_embedded: Arc<AtomicUsize>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            overrides: HashMap::new(),
            failing: Arc::new(AtomicBool::new(false)),
            texts_embedded: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pin the vector returned for `text`. The vector is normalized and
    /// padded or truncated to the provider's dimension.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        let mut vector = vector;
        vector.resize(self.dimension, 0.0);
        let embedding = to_f16_embeddings(vec![vector], true).remove(0);
        self.overrides.insert(text.into(), embedding);
        self
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of texts embedded so far, across all clones.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn embed_one(&self, text: &str) -> Embedding {
        if let Some(vector) = self.overrides.get(text) {
            return vector.clone();
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        to_f16_embeddings(vec![vector], true).remove(0)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbedError::embedding_gen(std::io::Error::other(
                "mock embedding provider is set to fail",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        self.check_failing()?;
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed_one(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        self.check_failing()?;
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(EmbeddingResult::new(
            texts.iter().map(|text| self.embed_one(text)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
