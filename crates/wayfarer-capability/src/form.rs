//! Booking-form collection as a routable capability.

use async_trait::async_trait;
use wayfarer_core::RequestContext;
use wayfarer_form::{FormCollector, FormRecord};

use crate::error::CapabilityError;
use crate::registry::Capability;

/// Runs one form turn on a fresh record.
///
/// Routed requests carry no form state, so this only ever starts the
/// conversation; clients that thread a record across turns use the form
/// endpoint directly.
pub struct FormCapability {
    collector: FormCollector,
}

impl FormCapability {
    pub fn new(collector: FormCollector) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Capability for FormCapability {
    fn name(&self) -> &str {
        "form"
    }

    fn description(&self) -> &str {
        "for creating and collecting travel booking information"
    }

    async fn respond(
        &self,
        utterance: &str,
        context: &RequestContext,
    ) -> Result<String, CapabilityError> {
        let turn = self.collector.turn(utterance, FormRecord::new()).await?;
        tracing::debug!(
            request_id = %context.request_id,
            completed = turn.completed_fields.len(),
            complete = turn.complete,
            "Form turn finished"
        );
        Ok(turn.response)
    }
}
