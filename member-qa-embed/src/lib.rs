//! # member-qa-embed
//!
//! Sentence embeddings for the member Q&A service. Text is mapped to dense,
//! L2-normalized half-precision vectors by a local ONNX model run through
//! FastEmbed, behind an async [`EmbeddingProvider`] trait so the retrieval
//! layer never depends on a concrete model.
//!
//! ## Features
//!
//! - **Local ONNX Models**: no external API calls to embed text
//! - **Explicit Model Selection**: the model is named in [`EmbedConfig`] and
//!   resolved once at startup
//! - **Model Caching**: providers with the same model share loaded weights
//! - **Half-Precision**: f16 vectors halve the memory held by the index
//! - **Deterministic Mock**: [`MockEmbeddingProvider`] for tests and offline use
//!
//! ## Quick Start
//!
//! ```no_run
//! use member_qa_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Layla: Booking a suite in London".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.

pub mod config;
pub mod error;
pub mod mock;
pub mod provider;

pub use config::{EmbedConfig, ModelSpec, supported_model_names};
pub use error::{EmbedError, Result};
pub use mock::MockEmbeddingProvider;
pub use provider::{Embedding, EmbeddingProvider, EmbeddingResult, FastEmbedProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_creation() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::default().with_cache_dir(temp_dir.path());

        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.resolve_model().unwrap().dimension, 384);

        let provider = FastEmbedProvider::new(config);
        assert_eq!(provider.embedding_dimension(), 384);
    }
}
