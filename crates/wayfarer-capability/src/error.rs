//! Error types for capabilities.

use wayfarer_core::error::WayfarerError;
use wayfarer_form::FormError;
use wayfarer_llm::LlmError;

/// Errors from a capability invocation or its collaborators.
///
/// These never reach the traveller directly: the dispatch loop records a
/// marker string in place of the capability's answer.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Completion failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Form turn failed: {0}")]
    Form(#[from] FormError),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Http("request timed out".to_string())
        } else {
            CapabilityError::Http(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for CapabilityError {
    fn from(err: rusqlite::Error) -> Self {
        CapabilityError::Cache(err.to_string())
    }
}

impl From<CapabilityError> for WayfarerError {
    fn from(err: CapabilityError) -> Self {
        WayfarerError::Capability(err.to_string())
    }
}
