use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{MessageSource, parse_message_page};
use crate::error::FetchError;
use crate::message::RawRecord;

/// Reads a saved messages document from disk.
///
/// The file has the same `{"items": [...]}` shape the HTTP endpoint serves,
/// so a `curl` dump can be replayed offline.
#[derive(Debug, Clone)]
pub struct FileMessageSource {
    path: PathBuf,
}

impl FileMessageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageSource for FileMessageSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawRecord>, FetchError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut records = parse_message_page(&body)?;
        records.truncate(limit);
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
