//! API error type.
//!
//! Request-level failures are reported in-band: the status stays 200 and
//! the body is `{"error": "..."}`, so clients only ever check for the
//! `error` key.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use wayfarer_chat::ChatError;
use wayfarer_form::FormError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Rejected input or a failed orchestration step.
    Chat(ChatError),
    /// A form turn that could not produce a reply.
    Form(FormError),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Chat(e) => write!(f, "{}", e),
            ApiError::Form(e) => write!(f, "{}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match &self {
            ApiError::Chat(ChatError::EmptyMessage | ChatError::MessageTooLong(_)) => {
                tracing::debug!(error = %message, "Rejected request input");
            }
            _ => tracing::error!(error = %message, "Request failed"),
        }
        (StatusCode::OK, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::Chat(err)
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        ApiError::Form(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_llm::LlmError;

    #[test]
    fn test_display_passes_through() {
        let err = ApiError::from(ChatError::EmptyMessage);
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ApiError::from(ChatError::Llm(LlmError::Timeout));
        assert_eq!(err.to_string(), "LLM error: request timed out");
    }

    #[test]
    fn test_errors_are_reported_with_ok_status() {
        let resp = ApiError::from(ChatError::MessageTooLong(2000)).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
