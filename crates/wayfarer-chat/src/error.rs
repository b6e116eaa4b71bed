//! Error types for request orchestration.

use wayfarer_core::error::WayfarerError;
use wayfarer_llm::LlmError;

/// Request-level failures. Capability failures never appear here; they
/// are recorded as marker text and the request carries on.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl From<ChatError> for WayfarerError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Llm(e) => WayfarerError::Completion(e.to_string()),
            other => WayfarerError::Api(other.to_string()),
        }
    }
}
