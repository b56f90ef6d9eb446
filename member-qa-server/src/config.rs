//! Server configuration, loaded from TOML and overridden from the command line.

use member_qa_embed::EmbedConfig;
use member_qa_retriever::RetrievalConfig;
use member_qa_retriever::ingest::{DEFAULT_FETCH_LIMIT, DEFAULT_SOURCE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GENERATION_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Where member messages are fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            limit: DEFAULT_FETCH_LIMIT,
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text generation backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub api_base: String,
    /// Normally supplied through `GEMINI_API_KEY`; never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GENERATION_MODEL.to_string(),
            api_base: DEFAULT_GENERATION_API_BASE.to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration for the Q&A service.
///
/// Every field has a default, so an empty file (or no file at all) is a
/// valid starting point:
///
/// ```toml
/// bind_addr = "127.0.0.1:8000"
/// refresh_interval_secs = 600
///
/// [retrieval]
/// top_k = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Background rebuild period; 0 disables it
    pub refresh_interval_secs: u64,
    pub source: SourceConfig,
    pub embedding: EmbedConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            refresh_interval_secs: 0,
            source: SourceConfig::default(),
            embedding: EmbedConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    /// Check everything needed before the server may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .generation
            .api_key
            .as_deref()
            .is_none_or(|key| key.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "GEMINI_API_KEY is not set; a generation API key is required",
            ));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ConfigError::invalid("generation.model must not be empty"));
        }
        if self.embedding.model_name().trim().is_empty() {
            return Err(ConfigError::invalid("embedding.model_name must not be empty"));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::invalid("retrieval.top_k must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(ConfigError::invalid(
                "retrieval.threshold must be between -1 and 1",
            ));
        }
        if self.source.limit == 0 {
            return Err(ConfigError::invalid("source.limit must be at least 1"));
        }
        self.embedding
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))
    }
}
