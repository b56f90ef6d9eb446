use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{GenerationError, Generator};

/// One queued outcome for [`ScriptedGenerator`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Timeout,
    Status(u16),
}

/// Generator that replays queued replies. Once the queue is drained it keeps
/// returning the fallback text. Clones share the queue and call counter.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: String,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback: fallback.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Timeout) => Err(GenerationError::Timeout {
                after: Duration::from_secs(60),
            }),
            Some(ScriptedReply::Status(status)) => Err(GenerationError::Status {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Ok(self.fallback.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
