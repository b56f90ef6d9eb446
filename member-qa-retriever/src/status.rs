//! Point-in-time view of the message index, for `/status` and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retrieval::message_index::IndexState;

/// Index health as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Empty or Ready
    pub state: IndexState,
    /// Messages in the published snapshot
    pub indexed_messages: usize,
    /// Vector width of the embedding provider
    pub embedding_dimension: usize,
    /// Provider name, e.g. `fastembed`
    pub provider: String,
    /// Successful builds since startup
    pub rebuilds: u64,
    /// When the published snapshot was built; `None` before the first build
    pub last_built_at: Option<DateTime<Utc>>,
}

impl IndexStatus {
    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let built = self
            .last_built_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "{} | {} messages | {} ({} dims) | {} rebuilds | last built {}",
            self.state,
            self.indexed_messages,
            self.provider,
            self.embedding_dimension,
            self.rebuilds,
            built
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> IndexStatus {
        IndexStatus {
            state: IndexState::Empty,
            indexed_messages: 0,
            embedding_dimension: 384,
            provider: "fastembed".to_string(),
            rebuilds: 0,
            last_built_at: None,
        }
    }

    #[test]
    fn test_summary_before_first_build() {
        let summary = status().summary();
        assert!(summary.starts_with("empty | 0 messages"));
        assert!(summary.ends_with("last built never"));
    }

    #[test]
    fn test_serializes_state_lowercase() {
        let json = serde_json::to_value(status()).unwrap();
        assert_eq!(json["state"], "empty");
        assert_eq!(json["indexed_messages"], 0);
        assert!(json["last_built_at"].is_null());
    }
}
