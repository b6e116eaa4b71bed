//! Per-request orchestration state.

use wayfarer_core::{latest_human, Message, RequestContext};

/// Capability answers in execution order.
///
/// A key's presence means the capability already ran for this request,
/// whatever its text says. Entries are never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityResults {
    entries: Vec<(String, String)>,
}

impl CapabilityResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer. Returns `false`, leaving the existing entry in
    /// place, when `name` already has one.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, text.into()));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, t)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything one routed request accumulates. Discarded when the request
/// ends.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub routes: Vec<String>,
    pub results: CapabilityResults,
    pub context: RequestContext,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>, context: RequestContext) -> Self {
        Self {
            messages,
            routes: Vec::new(),
            results: CapabilityResults::new(),
            context,
        }
    }

    /// State for a single human message.
    pub fn from_input(input: impl Into<String>, context: RequestContext) -> Self {
        Self::new(vec![Message::human(input)], context)
    }

    pub fn latest_human(&self) -> Option<&str> {
        latest_human(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keep_insertion_order() {
        let mut results = CapabilityResults::new();
        assert!(results.insert("exchange", "1 USD = 0.92 EUR."));
        assert!(results.insert("weather", "Sunny."));
        assert_eq!(results.names().collect::<Vec<_>>(), vec!["exchange", "weather"]);
        assert_eq!(
            results.texts().collect::<Vec<_>>(),
            vec!["1 USD = 0.92 EUR.", "Sunny."]
        );
    }

    #[test]
    fn test_results_never_overwrite() {
        let mut results = CapabilityResults::new();
        assert!(results.insert("weather", "first"));
        assert!(!results.insert("weather", "second"));
        assert_eq!(results.get("weather"), Some("first"));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_empty_text_still_counts_as_executed() {
        let mut results = CapabilityResults::new();
        results.insert("form", "");
        assert!(results.contains("form"));
        assert!(!results.is_empty());
    }

    #[test]
    fn test_state_latest_human() {
        let state = ConversationState::new(
            vec![
                Message::human("weather in Rome?"),
                Message::assistant("Sunny."),
                Message::human("and in Oslo?"),
            ],
            RequestContext::default(),
        );
        assert_eq!(state.latest_human(), Some("and in Oslo?"));
        assert!(state.routes.is_empty());
        assert!(state.results.is_empty());
    }
}
