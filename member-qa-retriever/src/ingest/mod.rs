//! Ingestion adapters: where raw member records come from.
//!
//! A [`MessageSource`] fetches up to `limit` raw records. Sources speak the
//! same JSON document shape:
//!
//! ```json
//! { "items": [ { "user_name": "Layla", "message": "Booking a suite..." } ] }
//! ```
//!
//! [`refresh_index`] is the one place fetch and build meet. A failed fetch
//! never reaches the index, so whatever was published before stays live.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{FetchError, RefreshError};
use crate::message::RawRecord;
use crate::retrieval::message_index::{BuildOutcome, MessageIndex};

pub mod file_source;
pub mod http_source;

pub use file_source::FileMessageSource;
pub use http_source::{
    DEFAULT_FETCH_LIMIT, DEFAULT_FETCH_TIMEOUT, DEFAULT_SOURCE_URL, HttpMessageSource,
};

/// Something that can produce raw member records.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch at most `limit` records.
    async fn fetch(&self, limit: usize) -> Result<Vec<RawRecord>, FetchError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    items: Vec<Value>,
}

/// Decode a `{"items": [...]}` document. A missing `items` key is zero records.
pub fn parse_message_page(body: &[u8]) -> Result<Vec<RawRecord>, FetchError> {
    let page: MessagePage = serde_json::from_slice(body)?;
    Ok(page.items.iter().map(RawRecord::from_json).collect())
}

/// In-memory source, mostly for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticMessageSource {
    records: Vec<RawRecord>,
}

impl StaticMessageSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl MessageSource for StaticMessageSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawRecord>, FetchError> {
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }
}

/// Fetch from `source` and rebuild `index` from the result.
///
/// Fetch and embedding failures are logged and returned; in both cases the
/// previously published index is left untouched.
pub async fn refresh_index(
    source: &dyn MessageSource,
    index: &MessageIndex,
    limit: usize,
) -> Result<BuildOutcome, RefreshError> {
    info!("Fetching member data from {}", source.describe());

    let records = match source.fetch(limit).await {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to fetch member messages, keeping current index: {}", e);
            return Err(e.into());
        }
    };

    info!("Fetched {} records", records.len());
    match index.build(records).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!("Index rebuild aborted, keeping current index: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::message_index::IndexState;
    use member_qa_embed::MockEmbeddingProvider;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct UnreachableSource;

    #[async_trait]
    impl MessageSource for UnreachableSource {
        async fn fetch(&self, _limit: usize) -> Result<Vec<RawRecord>, FetchError> {
            Err(FetchError::Status {
                url: "http://members.invalid/messages".to_string(),
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
        }

        fn describe(&self) -> String {
            "http://members.invalid/messages".to_string()
        }
    }

    fn seeded_source() -> StaticMessageSource {
        StaticMessageSource::new(vec![
            RawRecord::new("Layla", "Booking a suite for 5 nights in London"),
            RawRecord::new("Sam", "I like pizza"),
            RawRecord::new("Amira", "Need a table for two on Friday"),
        ])
    }

    #[test]
    fn test_parse_message_page() {
        let body = br#"{
            "total": 3,
            "items": [
                {"user_name": "Layla", "message": "Booking a suite"},
                {"user_name": "Sam"},
                {"message": "no speaker"}
            ]
        }"#;
        let records = parse_message_page(body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RawRecord::new("Layla", "Booking a suite"));
        assert!(records[1].message.is_none());
    }

    #[test]
    fn test_parse_message_page_without_items() {
        assert!(parse_message_page(br#"{"total": 0}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_message_page_rejects_garbage() {
        let err = parse_message_page(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_static_source_honors_limit() {
        let records = seeded_source().fetch(2).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_builds_index() {
        let index = MessageIndex::new(Arc::new(MockEmbeddingProvider::new(16)));
        let outcome = refresh_index(&seeded_source(), &index, 5000).await.unwrap();

        assert_eq!(outcome.state, IndexState::Ready);
        assert_eq!(outcome.indexed, 3);
        assert_eq!(index.len().await, 3);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_index() {
        let index = MessageIndex::new(Arc::new(MockEmbeddingProvider::new(16)));
        refresh_index(&seeded_source(), &index, 5000).await.unwrap();
        let before = index.snapshot().await;

        let err = refresh_index(&UnreachableSource, &index, 5000)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Fetch { .. }));

        assert!(Arc::ptr_eq(&before, &index.snapshot().await));
        assert_eq!(index.state().await, IndexState::Ready);
        assert!(logs_contain("Failed to fetch member messages"));
    }

    #[tokio::test]
    async fn test_fetch_failure_on_fresh_index_stays_empty() {
        let index = MessageIndex::new(Arc::new(MockEmbeddingProvider::new(16)));
        assert!(refresh_index(&UnreachableSource, &index, 10).await.is_err());
        assert_eq!(index.state().await, IndexState::Empty);
    }

    #[tokio::test]
    async fn test_refresh_embedding_failure_keeps_previous_index() {
        let embedder = MockEmbeddingProvider::new(16);
        let index = MessageIndex::new(Arc::new(embedder.clone()));
        refresh_index(&seeded_source(), &index, 5000).await.unwrap();

        embedder.set_failing(true);
        let err = refresh_index(&seeded_source(), &index, 5000)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Index { .. }));
        assert_eq!(index.len().await, 3);
    }
}
