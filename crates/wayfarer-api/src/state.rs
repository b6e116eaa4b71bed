//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use wayfarer_chat::TravelAgent;
use wayfarer_core::config::WayfarerConfig;
use wayfarer_form::FormCollector;

/// Shared application state.
///
/// Everything here is immutable after startup; handlers only read it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WayfarerConfig>,
    /// Routes, dispatches and combines `/ask` requests.
    pub agent: Arc<TravelAgent>,
    /// Runs stateful `/form` turns; the client threads the record.
    pub form: Arc<FormCollector>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: WayfarerConfig, agent: TravelAgent, form: FormCollector) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
            form: Arc::new(form),
            start_time: Instant::now(),
        }
    }
}
