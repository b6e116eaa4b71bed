//! Merging capability answers into one reply.

use std::sync::Arc;

use wayfarer_core::Message;
use wayfarer_llm::CompletionService;

use crate::error::ChatError;
use crate::state::CapabilityResults;

/// Reply used when no capability produced anything.
pub const NO_INFORMATION: &str = "No relevant information found.";

const COMBINER_PROMPT: &str = "You are a friendly and professional travel assistant. Combine the \
following information into a single response in a consistent voice. Keep it concise, helpful, \
and natural.";

#[derive(Clone)]
pub struct Combiner {
    llm: Arc<dyn CompletionService>,
}

impl Combiner {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Paraphrase all answers, in execution order, in a single voice.
    ///
    /// With no answers this returns [`NO_INFORMATION`] without calling the
    /// completion service. A failed call fails the request; there is no
    /// retry.
    pub async fn combine(&self, results: &CapabilityResults) -> Result<String, ChatError> {
        if results.is_empty() {
            return Ok(NO_INFORMATION.to_string());
        }

        let combined = results.texts().collect::<Vec<_>>().join("\n\n");
        tracing::debug!(parts = results.len(), "Combining capability answers");
        Ok(self
            .llm
            .complete(COMBINER_PROMPT, &[Message::human(combined)])
            .await?)
    }
}
