//! Error types for the booking form.

use wayfarer_core::WayfarerError;
use wayfarer_llm::LlmError;

/// Errors from schema loading and form turns.
///
/// Extraction problems never surface here: an unusable extraction reply
/// leaves the record unchanged.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid form schema: {0}")]
    Schema(String),
    #[error("failed to read form schema: {0}")]
    Io(#[from] std::io::Error),
    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),
}

impl From<FormError> for WayfarerError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Schema(msg) => WayfarerError::Schema(msg),
            FormError::Io(e) => WayfarerError::Io(e),
            FormError::Llm(e) => WayfarerError::Completion(e.to_string()),
        }
    }
}
