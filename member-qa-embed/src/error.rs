//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems (unknown model names, bad batch sizes),
/// model loading failures, and runtime failures while generating vectors.
/// Variants carry their underlying cause so callers can log the full chain
/// while only surfacing the category.
///
/// # Error Categories
///
/// - **Configuration Errors**: Invalid or unsupported model settings
/// - **Initialization Errors**: Failures during model loading or validation
/// - **Runtime Errors**: Problems during actual embedding generation
/// - **External Errors**: Failures from dependencies (fastembed, tokio)
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model name is not one the provider knows how to load
    #[error("Unsupported embedding model: {model_name}")]
    UnsupportedModel { model_name: String },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A shared model handle was poisoned by a panicking embedding task
    #[error("Embedding model lock poisoned")]
    LockPoisoned,

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create an embedding generation error from any error type.
    ///
    /// Used for failures that happen while a loaded model is producing
    /// vectors, as opposed to failures loading the model in the first place.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
