use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{MessageSource, parse_message_page};
use crate::error::FetchError;
use crate::message::RawRecord;

/// Public member messages endpoint.
pub const DEFAULT_SOURCE_URL: &str =
    "https://november7-730026606190.europe-west1.run.app/messages";

/// Records requested per refresh.
pub const DEFAULT_FETCH_LIMIT: usize = 5000;

/// Default request timeout for the messages endpoint.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches `GET <url>?limit=<n>` and decodes the `items` array.
#[derive(Debug, Clone)]
pub struct HttpMessageSource {
    url: String,
    client: reqwest::Client,
}

impl HttpMessageSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageSource for HttpMessageSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawRecord>, FetchError> {
        let transport = |source| FetchError::Transport {
            url: self.url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        debug!("Received {} bytes from {}", body.len(), self.url);
        parse_message_page(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
