//! member-qa-retriever: in-memory semantic index over member messages
//!
//! Raw member records are fetched from a [`MessageSource`](ingest::MessageSource),
//! normalized into `"speaker: text"` messages, embedded once, and published as
//! an immutable snapshot. Questions are embedded with the same provider and
//! answered with the best-matching messages.
//!
//! ## Key Modules
//!
//! - **[`ingest`]**: HTTP, file and in-memory sources plus [`refresh_index`](ingest::refresh_index)
//! - **[`retrieval`]**: the copy-on-build [`MessageIndex`] and the [`Retriever`]
//! - **[`message`]**: raw record normalization
//! - **[`status`]**: index health reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use member_qa_embed::MockEmbeddingProvider;
//! use member_qa_retriever::{
//!     MessageIndex, RetrievalConfig, Retriever,
//!     ingest::{StaticMessageSource, refresh_index},
//!     message::RawRecord,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index = Arc::new(MessageIndex::new(Arc::new(MockEmbeddingProvider::new(64))));
//! let source = StaticMessageSource::new(vec![RawRecord::new("Layla", "Flying to London")]);
//! refresh_index(&source, &index, 5000).await?;
//!
//! let retriever = Retriever::new(index, RetrievalConfig::default());
//! let context = retriever.retrieve("Where is Layla going?").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! MessageSource → RawRecord → Message → embed → IndexSnapshot
//!                                                   ↓
//!                       question → embed → rank top-k → context
//! ```

pub mod error;
pub mod ingest;
pub mod message;
pub mod retrieval;
pub mod status;

pub use error::{FetchError, IndexError, RefreshError, RetrieveError};
pub use message::{Message, RawRecord};
pub use retrieval::{
    BuildOutcome, IndexSnapshot, IndexState, MessageIndex, RetrievalConfig, RetrievalResult,
    Retriever, ScoredMessage,
};
pub use status::IndexStatus;
