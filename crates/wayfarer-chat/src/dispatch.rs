//! Dispatch decisions: which capability runs next, if any.

use wayfarer_capability::CapabilityRegistry;

use crate::state::CapabilityResults;

/// What the dispatch loop does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Run(String),
    Done,
}

/// The first route without a recorded result, or [`Step::Done`].
///
/// Pure: calling it again with the same inputs gives the same answer, and
/// it never selects a capability that already has a result.
pub fn next_step(routes: &[String], results: &CapabilityResults) -> Step {
    routes
        .iter()
        .find(|route| !results.contains(route))
        .map(|route| Step::Run(route.clone()))
        .unwrap_or(Step::Done)
}

/// Drop routes that name no registered capability.
pub fn validate_routes(routes: Vec<String>, registry: &CapabilityRegistry) -> Vec<String> {
    routes
        .into_iter()
        .filter(|route| {
            let known = registry.contains(route);
            if !known {
                tracing::warn!(route = %route, "Dropping unknown route");
            }
            known
        })
        .collect()
}

/// Text recorded in place of a failed capability's answer.
pub fn error_marker(name: &str, error: &dyn std::fmt::Display) -> String {
    format!("[{} unavailable: {}]", name, error)
}
