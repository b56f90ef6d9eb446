//! Error types for indexing, retrieval and ingestion

use member_qa_embed::EmbedError;
use std::path::PathBuf;

/// Failures while building a [`MessageIndex`](crate::retrieval::message_index::MessageIndex).
///
/// Any of these aborts the build and leaves the previously published
/// snapshot in place.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The embedding provider failed on the message batch
    #[error("Embedding messages failed: {source}")]
    Embedding {
        #[from]
        source: EmbedError,
    },

    /// The provider returned a different number of vectors than messages
    #[error("Embedding provider returned {embeddings} vectors for {messages} messages")]
    EmbeddingCountMismatch { messages: usize, embeddings: usize },
}

/// Failures while turning a question into context.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("Embedding question failed: {source}")]
    QuestionEmbedding {
        #[from]
        source: EmbedError,
    },
}

/// Failures fetching raw records from an ingestion source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body read failure
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The payload was not the expected JSON document
    #[error("Could not decode message payload: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    /// A file source could not be read
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of a fetch-then-build refresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Fetching member messages failed: {source}")]
    Fetch {
        #[from]
        source: FetchError,
    },

    #[error("Rebuilding the message index failed: {source}")]
    Index {
        #[from]
        source: IndexError,
    },
}
