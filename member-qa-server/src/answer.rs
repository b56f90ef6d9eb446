//! Retrieve-then-generate answering.

use member_qa_retriever::{IndexState, RetrieveError, Retriever};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::generation::{GenerationError, Generator};

/// Returned when no indexed message clears the relevance threshold.
pub const NO_RELEVANT_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the member messages to answer this question.";

/// Returned when the generator produced only whitespace.
pub const EMPTY_GENERATION_ANSWER: &str =
    "I'm having trouble generating an answer. Please try rephrasing your question.";

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Generated,
    NoRelevantContext,
    EmptyGeneration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
}

impl Answer {
    fn canned(text: &str, kind: AnswerKind) -> Self {
        Self {
            text: text.to_string(),
            kind,
        }
    }
}

/// Failures surfaced to callers. Causes are logged, not carried.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    /// The index holds no messages yet
    #[error("Service is unavailable. Data store is not initialized.")]
    Unavailable,

    #[error("Error retrieving member messages.")]
    RetrievalFailed,

    #[error("Error generating answer. Please try again later.")]
    GenerationFailed,
}

/// Build the generation prompt around newline-joined context lines.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about member preferences and activities.

Answer the user's question based ONLY on the provided member messages below.
If the answer is not in the messages, clearly state that you cannot find the information.
Be concise but informative.

--- MEMBER MESSAGES ---
{context}
--- END MESSAGES ---

Question: {question}

Answer (be specific and cite member names when relevant):"
    )
}

/// Turns a question into an answer using the shared index and a generator.
#[derive(Clone)]
pub struct AnswerOrchestrator {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl AnswerOrchestrator {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question`.
    ///
    /// The readiness check and the ranking use the same snapshot. The
    /// generator is called at most once, and only when at least one message
    /// is relevant.
    pub async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let snapshot = self.retriever.index().snapshot().await;
        if snapshot.state() != IndexState::Ready {
            warn!("Question received before the message index is ready");
            return Err(AnswerError::Unavailable);
        }

        let context = self
            .retriever
            .retrieve_in(&snapshot, question)
            .await
            .map_err(|e: RetrieveError| {
                error!("Retrieval failed: {}", e);
                AnswerError::RetrievalFailed
            })?;

        if context.is_empty() {
            info!("No relevant member messages for question");
            return Ok(Answer::canned(
                NO_RELEVANT_CONTEXT_ANSWER,
                AnswerKind::NoRelevantContext,
            ));
        }

        let prompt = build_prompt(&context, question);
        let generated = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e: GenerationError| {
                error!(
                    "Error calling generation model {}: {}",
                    self.generator.model_name(),
                    e
                );
                AnswerError::GenerationFailed
            })?;

        let text = generated.trim();
        if text.is_empty() {
            warn!("Generation model returned an empty answer");
            return Ok(Answer::canned(
                EMPTY_GENERATION_ANSWER,
                AnswerKind::EmptyGeneration,
            ));
        }

        Ok(Answer {
            text: text.to_string(),
            kind: AnswerKind::Generated,
        })
    }
}
