//! Capability trait and the registry the router chooses from.

use std::sync::Arc;

use async_trait::async_trait;
use wayfarer_core::RequestContext;

use crate::error::CapabilityError;

/// A specialised responder for one kind of traveller request.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Lowercase name the router selects this capability by.
    fn name(&self) -> &str;

    /// One-line description shown to the router.
    fn description(&self) -> &str;

    /// Answer `utterance`, the latest human message.
    async fn respond(
        &self,
        utterance: &str,
        context: &RequestContext,
    ) -> Result<String, CapabilityError>;
}

/// Registered capabilities, in registration order.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. A later registration under the same name
    /// replaces the earlier one in place.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if let Some(slot) = self.capabilities.iter_mut().find(|c| c.name() == name) {
            tracing::warn!(capability = %name, "Replacing registered capability");
            *slot = capability;
        } else {
            tracing::debug!(capability = %name, "Registered capability");
            self.capabilities.push(capability);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.iter().find(|c| c.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.iter().map(|c| c.name().to_string()).collect()
    }

    /// `(name, description)` pairs for the router prompt.
    pub fn catalog(&self) -> Vec<(String, String)> {
        self.capabilities
            .iter()
            .map(|c| (c.name().to_string(), c.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        name: &'static str,
        description: &'static str,
    }

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            self.description
        }

        async fn respond(
            &self,
            utterance: &str,
            _context: &RequestContext,
        ) -> Result<String, CapabilityError> {
            Ok(format!("{}: {}", self.name, utterance))
        }
    }

    fn echo(name: &'static str, description: &'static str) -> Arc<dyn Capability> {
        Arc::new(Echo { name, description })
    }

    #[test]
    fn test_registry_keeps_registration_order() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo("weather", "forecasts"));
        registry.register(echo("exchange", "currency"));
        registry.register(echo("form", "booking"));

        assert_eq!(registry.names(), vec!["weather", "exchange", "form"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.catalog()[1],
            ("exchange".to_string(), "currency".to_string())
        );
    }

    #[test]
    fn test_registry_replaces_same_name_in_place() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo("weather", "old"));
        registry.register(echo("exchange", "currency"));
        registry.register(echo("weather", "new"));

        assert_eq!(registry.names(), vec!["weather", "exchange"]);
        assert_eq!(registry.get("weather").unwrap().description(), "new");
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        registry.register(echo("weather", "forecasts"));
        assert!(registry.contains("weather"));
        assert!(!registry.contains("hotel"));
        assert!(registry.get("hotel").is_none());
    }

    #[tokio::test]
    async fn test_registered_capability_responds() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo("weather", "forecasts"));
        let reply = registry
            .get("weather")
            .unwrap()
            .respond("rain in Oslo?", &RequestContext::default())
            .await
            .unwrap();
        assert_eq!(reply, "weather: rain in Oslo?");
    }
}
