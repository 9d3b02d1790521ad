//! Reasoner trait: the external reasoning call behind the pipeline.
//!
//! The reasoner is a black box: `prompt -> free text`. No contract on
//! response shape is enforced here; callers must parse defensively (see
//! [`crate::parse`]).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

/// Trait for reasoning backends.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Send a prompt and return the raw response text.
    async fn invoke(&self, prompt: &str) -> Result<String, ReasonerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: status {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Deterministic reasoner for tests: replays queued responses in order,
/// then repeats the last one.
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedReasoner {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let queue: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        let last = queue.back().cloned().unwrap_or_default();
        Self {
            responses: Mutex::new(queue),
            last: Mutex::new(last),
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn invoke(&self, _prompt: &str) -> Result<String, ReasonerError> {
        let mut queue = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match queue.pop_front() {
            Some(response) => {
                *self.last.lock().unwrap_or_else(|e| e.into_inner()) = response.clone();
                Ok(response)
            }
            None => Ok(self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()),
        }
    }
}
