//! Completion service abstraction for Wayfarer.
//!
//! Every language-model call in the workspace goes through the
//! [`CompletionService`] trait so orchestration can be driven by a
//! scripted stub in tests and by the Anthropic Messages API in production.

pub mod anthropic;
pub mod error;
pub mod scripted;

use async_trait::async_trait;
use wayfarer_core::Message;

pub use anthropic::{AnthropicCompletion, AnthropicCompletionBuilder};
pub use error::LlmError;
pub use scripted::{RecordedCall, ScriptedCompletion};

/// A text-generation backend.
///
/// `system` is the instruction for this call; `turns` are the
/// conversation entries that follow it, oldest first. Calls are not
/// streamed and are attempted exactly once.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError>;
}
