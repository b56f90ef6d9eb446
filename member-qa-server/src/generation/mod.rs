//! Text generation backends.
//!
//! The answer path only needs "prompt in, text out". [`GeminiGenerator`] talks
//! to the hosted Gemini API; [`ScriptedGenerator`] replays canned replies in
//! tests.

use async_trait::async_trait;
use std::time::Duration;

pub mod gemini;
pub mod mock;

pub use gemini::GeminiGenerator;
pub use mock::{ScriptedGenerator, ScriptedReply};

/// A single-shot text generator.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`. Called at most once per question.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier, for logs and status
    fn model_name(&self) -> &str;
}

/// Why a generation attempt failed.
///
/// These never reach HTTP clients; they are logged and collapsed into a
/// generic failure by the answer orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No API key was configured for the backend
    #[error("Generation API key is not configured")]
    MissingApiKey,

    #[error("Generation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Generation request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The provider rejected the request (bad key, quota, invalid model, ...)
    #[error("Generation provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed generation response: {message}")]
    MalformedResponse { message: String },

    /// The provider answered without any candidate, usually a safety block
    #[error("Generation returned no candidates (block reason: {reason:?})")]
    NoCandidates { reason: Option<String> },
}

impl GenerationError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}
