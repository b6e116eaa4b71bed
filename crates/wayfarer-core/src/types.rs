use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message in the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The traveller talking to the assistant.
    Human,
    /// Text produced by the assistant.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Human => write!(f, "human"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

// =============================================================================
// Structs
// =============================================================================

/// A single role-tagged entry in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Read-only side channel threaded through every capability invocation.
///
/// Carries the caller's network origin (used for geolocation) and a
/// request id that shows up as a tracing field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: Option<String>,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    pub fn new(client_ip: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            client_ip,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Return the content of the most recent human message, if any.
pub fn latest_human(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Human)
        .map(|m| m.content.as_str())
}
