//! Capability selection from free-form text.

use std::sync::Arc;

use wayfarer_core::Message;
use wayfarer_llm::CompletionService;

/// Decides which capabilities should answer a message.
#[derive(Clone)]
pub struct Router {
    llm: Arc<dyn CompletionService>,
    default_route: String,
}

impl Router {
    pub fn new(llm: Arc<dyn CompletionService>, default_route: impl Into<String>) -> Self {
        Self {
            llm,
            default_route: default_route.into(),
        }
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// One completion call over `messages`, parsed into route names.
    ///
    /// Names are not checked against any registry here. An empty reply or
    /// a failed call yields the default route.
    pub async fn decide(&self, messages: &[Message], catalog: &[(String, String)]) -> Vec<String> {
        let system = system_prompt(catalog);
        let routes = match self.llm.complete(&system, messages).await {
            Ok(reply) => parse_routes(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Routing call failed, using default route");
                Vec::new()
            }
        };

        if routes.is_empty() {
            tracing::debug!(route = %self.default_route, "Falling back to default route");
            vec![self.default_route.clone()]
        } else {
            routes
        }
    }
}

fn system_prompt(catalog: &[(String, String)]) -> String {
    let agents = catalog
        .iter()
        .map(|(name, description)| format!("- '{}': {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a routing assistant. Given the user's request, decide which specialized agents \
         should handle it.\nAvailable agents:\n{}\nRespond with only the agent names separated by \
         commas, or pick one.",
        agents
    )
}

/// Lowercased, trimmed, comma-separated names. Quotes and trailing periods
/// around each name are stripped and empty names are skipped.
pub fn parse_routes(reply: &str) -> Vec<String> {
    reply
        .trim()
        .to_lowercase()
        .split(',')
        .map(|token| {
            token
                .trim()
                .trim_end_matches('.')
                .trim_matches(|c: char| c == '\'' || c == '"' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_llm::{LlmError, ScriptedCompletion};

    fn catalog() -> Vec<(String, String)> {
        vec![
            ("weather".into(), "for weather forecasts or destinations".into()),
            ("exchange".into(), "for currency or travel money queries".into()),
        ]
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_routes_basic() {
        assert_eq!(parse_routes("weather"), vec!["weather"]);
        assert_eq!(parse_routes(" Weather, EXCHANGE "), vec!["weather", "exchange"]);
    }

    #[test]
    fn test_parse_routes_strips_decoration() {
        assert_eq!(
            parse_routes("'weather', \"exchange\"."),
            vec!["weather", "exchange"]
        );
        assert_eq!(parse_routes("`form`"), vec!["form"]);
    }

    #[test]
    fn test_parse_routes_empty() {
        assert!(parse_routes("").is_empty());
        assert!(parse_routes("  ,  ").is_empty());
    }

    #[test]
    fn test_parse_routes_keeps_unknown_names() {
        assert_eq!(parse_routes("hotel, weather"), vec!["hotel", "weather"]);
    }

    // ---- Decide ----

    #[tokio::test]
    async fn test_decide_uses_catalog_in_prompt() {
        let llm = Arc::new(ScriptedCompletion::new(["weather, exchange"]));
        let router = Router::new(llm.clone(), "weather");
        let messages = vec![Message::human("Weather in Tokyo and yen rates?")];

        let routes = router.decide(&messages, &catalog()).await;
        assert_eq!(routes, vec!["weather", "exchange"]);

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .system
            .contains("- 'weather': for weather forecasts or destinations"));
        assert!(calls[0]
            .system
            .contains("- 'exchange': for currency or travel money queries"));
        assert_eq!(calls[0].turns, messages);
    }

    #[tokio::test]
    async fn test_decide_empty_reply_falls_back() {
        let llm = Arc::new(ScriptedCompletion::new([" "]));
        let router = Router::new(llm, "weather");
        let routes = router.decide(&[Message::human("hi")], &catalog()).await;
        assert_eq!(routes, vec!["weather"]);
    }

    #[tokio::test]
    async fn test_decide_failed_call_falls_back() {
        let llm = Arc::new(ScriptedCompletion::failing(LlmError::Timeout));
        let router = Router::new(llm, "exchange");
        let routes = router.decide(&[Message::human("hi")], &catalog()).await;
        assert_eq!(routes, vec!["exchange"]);
    }
}
