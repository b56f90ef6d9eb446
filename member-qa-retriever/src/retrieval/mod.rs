pub mod message_index;
pub mod retriever;
pub mod similarity;

pub use message_index::{
    BuildOutcome, IndexSnapshot, IndexState, MessageIndex, RetrievalResult, ScoredMessage,
};
pub use retriever::{RetrievalConfig, Retriever};
