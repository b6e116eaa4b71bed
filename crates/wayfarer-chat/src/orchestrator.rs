//! Travel agent: routing, sequential dispatch, and combination for one
//! request.

use std::sync::Arc;
use std::time::Duration;

use wayfarer_capability::{Capability, CapabilityRegistry};
use wayfarer_core::config::OrchestrationConfig;
use wayfarer_core::{Message, RequestContext};
use wayfarer_llm::CompletionService;

use crate::combiner::Combiner;
use crate::dispatch::{error_marker, next_step, validate_routes, Step};
use crate::error::ChatError;
use crate::router::Router;
use crate::state::ConversationState;

/// Trimmed `input`, or an error when it is blank or longer than
/// `max_chars` characters.
pub fn validate_input(input: &str, max_chars: usize) -> Result<&str, ChatError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if input.chars().count() > max_chars {
        return Err(ChatError::MessageTooLong(max_chars));
    }
    Ok(input)
}

/// Central coordinator that routes a message, runs each chosen capability
/// once, and combines the answers.
pub struct TravelAgent {
    router: Router,
    combiner: Combiner,
    registry: Arc<CapabilityRegistry>,
    config: OrchestrationConfig,
}

impl TravelAgent {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        registry: Arc<CapabilityRegistry>,
        config: OrchestrationConfig,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&llm), config.default_route.clone()),
            combiner: Combiner::new(llm),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Validate a single message and answer it.
    pub async fn handle_message(
        &self,
        input: &str,
        context: RequestContext,
    ) -> Result<String, ChatError> {
        let input = validate_input(input, self.config.max_message_length)?;
        let mut state = ConversationState::from_input(input, context);
        self.run(&mut state).await
    }

    /// Route, dispatch and combine over `state`, appending the reply to its
    /// messages.
    pub async fn run(&self, state: &mut ConversationState) -> Result<String, ChatError> {
        let utterance = state
            .latest_human()
            .ok_or(ChatError::EmptyMessage)?
            .to_string();
        let request_id = state.context.request_id;

        let proposed = self
            .router
            .decide(&state.messages, &self.registry.catalog())
            .await;
        state.routes = validate_routes(proposed, &self.registry);
        tracing::info!(request_id = %request_id, routes = ?state.routes, "Routes decided");

        let mut steps = 0usize;
        while let Step::Run(name) = next_step(&state.routes, &state.results) {
            if steps >= self.config.step_limit {
                tracing::warn!(
                    request_id = %request_id,
                    limit = self.config.step_limit,
                    "Dispatch step limit reached"
                );
                break;
            }
            steps += 1;

            let text = match self.registry.get(&name) {
                Some(capability) => {
                    self.invoke(capability.as_ref(), &utterance, &state.context)
                        .await
                }
                None => error_marker(&name, &"not registered"),
            };
            state.results.insert(name, text);
        }

        let reply = self.combiner.combine(&state.results).await?;
        state.messages.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Run one capability, retrying as configured. Never fails: the last
    /// error becomes marker text.
    async fn invoke(
        &self,
        capability: &dyn Capability,
        utterance: &str,
        context: &RequestContext,
    ) -> String {
        let name = capability.name();
        let attempts = self.config.capability_retries + 1;

        let mut attempt = 1;
        loop {
            match capability.respond(utterance, context).await {
                Ok(text) => {
                    tracing::info!(
                        request_id = %context.request_id,
                        capability = %name,
                        attempt,
                        "Capability answered"
                    );
                    return text;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        request_id = %context.request_id,
                        capability = %name,
                        attempt,
                        error = %e,
                        "Capability failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %context.request_id,
                        capability = %name,
                        error = %e,
                        "Capability failed"
                    );
                    return error_marker(name, &e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wayfarer_capability::CapabilityError;
    use wayfarer_llm::{LlmError, ScriptedCompletion};

    use crate::combiner::NO_INFORMATION;

    /// Capability that replays scripted outcomes and counts calls.
    struct Stub {
        name: &'static str,
        outcomes: Mutex<Vec<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl Stub {
        fn ok(name: &'static str, reply: &str) -> Arc<Self> {
            Self::scripted(name, vec![Ok(reply.to_string())])
        }

        fn failing(name: &'static str, message: &str) -> Arc<Self> {
            Self::scripted(name, vec![Err(message.to_string())])
        }

        fn scripted(name: &'static str, outcomes: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Capability for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        async fn respond(
            &self,
            _utterance: &str,
            _context: &RequestContext,
        ) -> Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            // The last outcome repeats once the script runs out.
            let outcome = if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes[0].clone()
            };
            outcome.map_err(CapabilityError::Upstream)
        }
    }

    fn agent(
        llm: Arc<ScriptedCompletion>,
        stubs: &[Arc<Stub>],
        config: OrchestrationConfig,
    ) -> TravelAgent {
        let mut registry = CapabilityRegistry::new();
        for stub in stubs {
            registry.register(stub.clone());
        }
        TravelAgent::new(llm, Arc::new(registry), config)
    }

    fn fast_config() -> OrchestrationConfig {
        OrchestrationConfig {
            retry_backoff_ms: 1,
            ..OrchestrationConfig::default()
        }
    }

    // ---- Input validation ----

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let llm = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let agent = agent(llm.clone(), &[], fast_config());
        let err = agent
            .handle_message("   ", RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_long_message_rejected() {
        let llm = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let agent = agent(llm, &[], fast_config());
        let long = "a".repeat(2001);
        let err = agent
            .handle_message(&long, RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(2000)));
    }

    #[test]
    fn test_validate_input_counts_characters() {
        assert_eq!(validate_input("  hi  ", 5).unwrap(), "hi");
        assert!(validate_input(&"é".repeat(5), 5).is_ok());
        assert!(matches!(
            validate_input(&"é".repeat(6), 5),
            Err(ChatError::MessageTooLong(5))
        ));
    }

    // ---- Scenarios ----

    #[tokio::test]
    async fn test_single_weather_request() {
        let weather = Stub::ok(
            "weather",
            "Weather forecast for Paris on 2025-06-05: 16°C to 24°C, with a 10% chance of rain.",
        );
        let exchange = Stub::ok("exchange", "unused");
        let llm = Arc::new(ScriptedCompletion::new([
            "weather",
            "Tomorrow in Paris looks lovely: 16 to 24°C with little chance of rain.",
        ]));
        let agent = agent(llm.clone(), &[weather.clone(), exchange.clone()], fast_config());

        let mut state =
            ConversationState::from_input("What's the weather in Paris tomorrow?", RequestContext::default());
        let reply = agent.run(&mut state).await.unwrap();

        assert!(!reply.is_empty());
        assert_eq!(state.routes, vec!["weather"]);
        assert_eq!(state.results.names().collect::<Vec<_>>(), vec!["weather"]);
        assert_eq!(weather.calls(), 1);
        assert_eq!(exchange.calls(), 0);
        assert_eq!(state.messages.last(), Some(&Message::assistant(reply)));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_multiple_routes_run_in_order_once_each() {
        let weather = Stub::ok("weather", "Sunny in Tokyo.");
        let exchange = Stub::ok("exchange", "1 USD = 150 JPY.");
        let llm = Arc::new(ScriptedCompletion::new([
            "exchange, weather, exchange",
            "Combined.",
        ]));
        let agent = agent(llm.clone(), &[weather.clone(), exchange.clone()], fast_config());

        let reply = agent
            .handle_message("Tokyo weather and yen?", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(reply, "Combined.");
        assert_eq!(weather.calls(), 1);
        assert_eq!(exchange.calls(), 1);
        assert_eq!(
            llm.calls()[1].turns,
            vec![Message::human("1 USD = 150 JPY.\n\nSunny in Tokyo.")]
        );
    }

    #[tokio::test]
    async fn test_unknown_routes_never_block() {
        let weather = Stub::ok("weather", "Rain in Oslo.");
        let llm = Arc::new(ScriptedCompletion::new(["hotel, weather, both", "Bring an umbrella."]));
        let agent = agent(llm, &[weather.clone()], fast_config());

        let mut state = ConversationState::from_input("Oslo?", RequestContext::default());
        agent.run(&mut state).await.unwrap();
        assert_eq!(state.routes, vec!["weather"]);
        assert_eq!(state.results.names().collect::<Vec<_>>(), vec!["weather"]);
    }

    #[tokio::test]
    async fn test_only_unknown_routes_short_circuit() {
        let weather = Stub::ok("weather", "unused");
        let llm = Arc::new(ScriptedCompletion::new(["hotel"]));
        let agent = agent(llm.clone(), &[weather.clone()], fast_config());

        let reply = agent
            .handle_message("Book me a hotel", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(reply, NO_INFORMATION);
        assert_eq!(weather.calls(), 0);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_router_failure_uses_default_route() {
        let weather = Stub::ok("weather", "Mild in Lisbon.");
        let llm = Arc::new(ScriptedCompletion::with_results([
            Err(LlmError::Timeout),
            Ok("Mild weather ahead.".to_string()),
        ]));
        let agent = agent(llm, &[weather.clone()], fast_config());

        let reply = agent
            .handle_message("Lisbon?", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(reply, "Mild weather ahead.");
        assert_eq!(weather.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_capability_records_marker_and_continues() {
        let weather = Stub::failing("weather", "forecast service down");
        let exchange = Stub::ok("exchange", "1 USD = 0.92 EUR.");
        let llm = Arc::new(ScriptedCompletion::new(["weather, exchange", "Partial answer."]));
        let agent = agent(llm.clone(), &[weather.clone(), exchange.clone()], fast_config());

        let mut state = ConversationState::from_input("Paris?", RequestContext::default());
        let reply = agent.run(&mut state).await.unwrap();
        assert_eq!(reply, "Partial answer.");
        assert_eq!(weather.calls(), 1);
        assert_eq!(exchange.calls(), 1);

        let marker = state.results.get("weather").unwrap();
        assert!(marker.starts_with("[weather unavailable:"));
        assert!(marker.contains("forecast service down"));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let weather = Stub::scripted(
            "weather",
            vec![Err("flaky".to_string()), Ok("Clear skies.".to_string())],
        );
        let llm = Arc::new(ScriptedCompletion::new(["weather", "Clear skies ahead."]));
        let config = OrchestrationConfig {
            capability_retries: 2,
            ..fast_config()
        };
        let agent = agent(llm, &[weather.clone()], config);

        let mut state = ConversationState::from_input("Weather?", RequestContext::default());
        agent.run(&mut state).await.unwrap();
        assert_eq!(weather.calls(), 2);
        assert_eq!(state.results.get("weather"), Some("Clear skies."));
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let weather = Stub::failing("weather", "down");
        let llm = Arc::new(ScriptedCompletion::new(["weather", "Sorry."]));
        let config = OrchestrationConfig {
            capability_retries: 2,
            ..fast_config()
        };
        let agent = agent(llm, &[weather.clone()], config);

        agent
            .handle_message("Weather?", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(weather.calls(), 3);
    }

    #[tokio::test]
    async fn test_step_limit_bounds_dispatch() {
        let weather = Stub::ok("weather", "Sunny.");
        let exchange = Stub::ok("exchange", "unused");
        let llm = Arc::new(ScriptedCompletion::new(["weather, exchange", "Sunny."]));
        let config = OrchestrationConfig {
            step_limit: 1,
            ..fast_config()
        };
        let agent = agent(llm, &[weather.clone(), exchange.clone()], config);

        let mut state = ConversationState::from_input("Weather and money?", RequestContext::default());
        agent.run(&mut state).await.unwrap();
        assert_eq!(state.results.len(), 1);
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_combiner_failure_fails_request() {
        let weather = Stub::ok("weather", "Sunny.");
        let llm = Arc::new(ScriptedCompletion::with_results([
            Ok("weather".to_string()),
            Err(LlmError::RateLimited),
        ]));
        let agent = agent(llm, &[weather], fast_config());

        let err = agent
            .handle_message("Weather?", RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Llm(LlmError::RateLimited)));
    }
}
