//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, OnceLock};

/// A single embedding vector in half precision.
pub type Embedding = Vec<f16>;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Embedding>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when
    /// there are none.
    pub fn new(embeddings: Vec<Embedding>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

/// Get the global model cache
fn get_model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, and `embed_texts` yields the vectors `embed_text` would have
/// produced for each item. Empty strings are valid input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// FastEmbed-based embedding provider using local ONNX sentence models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider.
    ///
    /// The reported dimension is the configured model's native size until
    /// [`initialize`](Self::initialize) measures the loaded model.
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config
            .resolve_model()
            .map(|spec| spec.dimension)
            .unwrap_or(0);
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Loads the embedding model, reusing a cached instance when one exists
    /// for an identical configuration.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let spec = self.config.resolve_model()?;
        tracing::info!("Initializing FastEmbed provider for model: {}", spec.name);

        let cache_key = self.create_cache_key()?;

        let cached_data = {
            let cache = get_model_cache()
                .lock()
                .map_err(|_| EmbedError::LockPoisoned)?;
            cache
                .get(&cache_key)
                .map(|(model, dim)| (Arc::clone(model), *dim))
        };

        if let Some((cached_model, cached_dimension)) = cached_data {
            tracing::info!("Using cached model for: {}", spec.name);
            self.model = Some(cached_model);
            self.dimension = cached_dimension;
            return self.validate_model().await;
        }

        let config = self.config.clone();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!(
                    "Loading embedding model {} from {}",
                    spec.name,
                    config.cache_dir.display()
                );

                let init_options = InitOptions::new(spec.fastembed_model())
                    .with_cache_dir(config.cache_dir.clone())
                    .with_show_download_progress(config.show_download_progress);

                let mut model = TextEmbedding::try_new(init_options).map_err(|e| {
                    EmbedError::ModelInitialization { source: e.into() }
                })?;

                // Measure the real output size rather than trusting the table
                let sample = model
                    .embed(vec!["test".to_string()], None)
                    .map_err(|e| EmbedError::ModelInitialization { source: e.into() })?;
                let dimension = sample
                    .first()
                    .map(|emb| emb.len())
                    .unwrap_or(spec.dimension);

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model_arc = Arc::new(Mutex::new(model));
        {
            let mut cache = get_model_cache()
                .lock()
                .map_err(|_| EmbedError::LockPoisoned)?;
            cache.insert(cache_key, (Arc::clone(&model_arc), dimension));
        }

        self.model = Some(model_arc);
        self.dimension = dimension;

        self.validate_model().await
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// The configuration this provider was built from
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Create a cache key based on the model configuration.
    ///
    /// Batch size and normalization do not affect the loaded weights, so
    /// only the model identity and weight location are hashed.
    fn create_cache_key(&self) -> Result<String> {
        let identity = serde_json::json!({
            "model_name": self.config.resolve_model()?.name,
            "cache_dir": self.config.cache_dir,
        });
        let identity_json = serde_json::to_string(&identity)
            .map_err(|e| EmbedError::External { source: e.into() })?;

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(identity_json.as_bytes());

        Ok(format!("v1:{:x}", hasher.finish()))
    }

    /// Validate that the model is working correctly
    async fn validate_model(&self) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EmbedError::invalid_config("Model not initialized"))?;

        let model_clone = Arc::clone(model);
        let validation_result = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().map_err(|_| EmbedError::LockPoisoned)?;
            model_guard
                .embed(vec!["validation test".to_string()], None)
                .map_err(|e| EmbedError::EmbeddingGeneration { source: e.into() })
        })
        .await??;

        let embedding = validation_result.first().ok_or_else(|| {
            EmbedError::invalid_config("Model validation failed: no embeddings generated")
        })?;

        if embedding.is_empty() {
            return Err(EmbedError::invalid_config(
                "Model validation failed: empty embedding",
            ));
        }

        if embedding.len() != self.dimension {
            return Err(EmbedError::invalid_config(format!(
                "Model validation failed: expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(())
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        get_model_cache()
            .lock()
            .map(|cache_guard| cache_guard.len())
            .unwrap_or(0)
    }
}

/// Convert f32 model output to f16, optionally L2-normalizing each vector.
///
/// All-zero vectors are left as zeros.
pub fn to_f16_embeddings(embeddings: Vec<Vec<f32>>, normalize: bool) -> Vec<Embedding> {
    embeddings
        .into_iter()
        .map(|embedding| {
            let norm: f32 = if normalize {
                embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
            } else {
                0.0
            };
            if norm > 0.0 {
                embedding
                    .into_iter()
                    .map(|value| f16::from_f32(value / norm))
                    .collect()
            } else {
                embedding.into_iter().map(f16::from_f32).collect()
            }
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let batch_size = self.config.batch_size.max(1);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());

                let mut model_guard = model_clone.lock().map_err(|_| EmbedError::LockPoisoned)?;
                model_guard
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::EmbeddingGeneration { source: e.into() })
            })
            .await??;

            all_embeddings.extend(to_f16_embeddings(batch_embeddings, self.config.normalize));
        }

        if all_embeddings.len() != texts.len() {
            return Err(EmbedError::invalid_config(format!(
                "Model returned {} embeddings for {} texts",
                all_embeddings.len(),
                texts.len()
            )));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());

        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.embedding_dimension(), 384);
        assert_eq!(provider.config().model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_to_f16_embeddings_normalizes() {
        let converted = to_f16_embeddings(vec![vec![3.0, 4.0], vec![0.0, 0.0]], true);

        assert!((converted[0][0].to_f32() - 0.6).abs() < 1e-3);
        assert!((converted[0][1].to_f32() - 0.8).abs() < 1e-3);
        assert!(converted[1].iter().all(|v| v.to_f32() == 0.0));

        let raw = to_f16_embeddings(vec![vec![3.0, 4.0]], false);
        assert_eq!(raw[0][0].to_f32(), 3.0);
    }

    #[tokio::test]
    async fn test_uninitialized_provider_rejects_embedding() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());
        let err = provider.embed_text("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));

        // Empty batches never touch the model
        let empty = provider.embed_texts(&[]).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_fails_initialization() {
        let result = FastEmbedProvider::create(EmbedConfig::new("no-such-model")).await;
        assert!(matches!(result, Err(EmbedError::UnsupportedModel { .. })));
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = FastEmbedProvider::new(EmbedConfig::default())
            .create_cache_key()
            .unwrap();
        let key2 = FastEmbedProvider::new(EmbedConfig::default().with_batch_size(4))
            .create_cache_key()
            .unwrap();

        assert_eq!(key1, key2, "Batch size should not change the cache key");
        assert!(key1.starts_with("v1:"), "Cache key should have version prefix");

        let key3 = FastEmbedProvider::new(EmbedConfig::new("bge-small-en-v1.5"))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, key3, "Different model should produce different cache key");

        let key4 = FastEmbedProvider::new(EmbedConfig::default().with_cache_dir("/tmp/other"))
            .create_cache_key()
            .unwrap();
        assert_ne!(key1, key4, "Different weight location should produce different key");
    }

    #[tokio::test]
    #[ignore] // Downloads all-MiniLM-L6-v2; run with: cargo test -p member-qa-embed -- --ignored
    async fn test_minilm_embeddings_are_deterministic() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(provider.embedding_dimension(), 384);

        let text = "Layla: Booking a suite for 5 nights in London";
        let first = provider.embed_text(text).await?;
        let second = provider.embed_text(text).await?;
        assert_eq!(first, second, "Same text must embed identically");

        let batch = provider
            .embed_texts(&[text.to_string(), "Sam: I like pizza".to_string()])
            .await?;
        assert_eq!(batch.len(), 2);
        let drift: f32 = first
            .iter()
            .zip(batch.embeddings[0].iter())
            .map(|(a, b)| (a.to_f32() - b.to_f32()).abs())
            .fold(0.0, f32::max);
        assert!(drift < 1e-2, "Batch and single embeddings diverged by {drift}");

        // Second provider with the same config shares the cached model
        let _again = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(FastEmbedProvider::cache_size(), 1);

        Ok(())
    }
}
