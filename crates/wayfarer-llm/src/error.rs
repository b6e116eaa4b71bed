//! Completion service errors.

/// Errors from a completion backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API key not configured (set {0})")]
    MissingApiKey(String),

    #[error("conversation must contain at least one turn")]
    EmptyConversation,

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by completion service")]
    RateLimited,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("failed to parse completion response: {0}")]
    Parse(String),

    #[error("completion contained no text")]
    EmptyResponse,

    #[error("scripted completion exhausted")]
    Exhausted,
}

impl LlmError {
    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Authentication(body),
            408 => LlmError::Timeout,
            429 => LlmError::RateLimited,
            _ => LlmError::Server {
                status,
                message: body,
            },
        }
    }

    /// Whether a retry could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::RateLimited => true,
            LlmError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(err.to_string())
        }
    }
}

impl From<LlmError> for wayfarer_core::WayfarerError {
    fn from(err: LlmError) -> Self {
        wayfarer_core::WayfarerError::Completion(err.to_string())
    }
}
