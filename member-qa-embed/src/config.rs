//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when no explicit name is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Directory fastembed downloads model weights into by default.
pub const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

/// A model the provider knows how to load, with its native output dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Canonical name used in configuration files
    pub name: &'static str,
    /// Native embedding dimension
    pub dimension: usize,
    model: ModelKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelKind {
    AllMiniLmL6V2,
    AllMiniLmL12V2,
    BgeSmallEnV15,
    BgeBaseEnV15,
    NomicEmbedTextV15,
    MultilingualE5Small,
}

impl ModelSpec {
    /// The fastembed model identifier
    pub fn fastembed_model(&self) -> EmbeddingModel {
        match self.model {
            ModelKind::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            ModelKind::AllMiniLmL12V2 => EmbeddingModel::AllMiniLML12V2,
            ModelKind::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            ModelKind::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
            ModelKind::NomicEmbedTextV15 => EmbeddingModel::NomicEmbedTextV15,
            ModelKind::MultilingualE5Small => EmbeddingModel::MultilingualE5Small,
        }
    }
}

const SUPPORTED_MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "all-MiniLM-L6-v2",
        dimension: 384,
        model: ModelKind::AllMiniLmL6V2,
    },
    ModelSpec {
        name: "all-MiniLM-L12-v2",
        dimension: 384,
        model: ModelKind::AllMiniLmL12V2,
    },
    ModelSpec {
        name: "bge-small-en-v1.5",
        dimension: 384,
        model: ModelKind::BgeSmallEnV15,
    },
    ModelSpec {
        name: "bge-base-en-v1.5",
        dimension: 768,
        model: ModelKind::BgeBaseEnV15,
    },
    ModelSpec {
        name: "nomic-embed-text-v1.5",
        dimension: 768,
        model: ModelKind::NomicEmbedTextV15,
    },
    ModelSpec {
        name: "multilingual-e5-small",
        dimension: 384,
        model: ModelKind::MultilingualE5Small,
    },
];

/// Names of every model [`EmbedConfig::resolve_model`] accepts.
pub fn supported_model_names() -> impl Iterator<Item = &'static str> {
    SUPPORTED_MODELS.iter().map(|spec| spec.name)
}

/// Configuration for embedding models.
///
/// The model is named explicitly and resolved once when the provider is
/// created. Names are matched case-insensitively, with or without a
/// `sentence-transformers/` or `BAAI/` style organisation prefix.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    #[builder(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub model_name: String,
    /// Directory model weights are downloaded to and loaded from
    #[builder(default = "PathBuf::from(DEFAULT_CACHE_DIR)")]
    pub cache_dir: PathBuf,
    /// Maximum batch size for embedding generation
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Print download progress the first time a model is fetched
    #[builder(default = "true")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Configuration for a named model with every other setting defaulted
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured name to a supported model.
    pub fn resolve_model(&self) -> Result<ModelSpec> {
        let requested = self.model_name.trim();
        let bare = requested.rsplit('/').next().unwrap_or(requested);

        SUPPORTED_MODELS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(bare))
            .copied()
            .ok_or_else(|| EmbedError::UnsupportedModel {
                model_name: requested.to_string(),
            })
    }

    /// Validate the configuration without loading anything
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        let spec = self.resolve_model()?;
        tracing::debug!(
            "Embedding config valid: model={} dimension={}",
            spec.name,
            spec.dimension
        );
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            batch_size: 32,
            normalize: true,
            show_download_progress: true,
        }
    }
}
