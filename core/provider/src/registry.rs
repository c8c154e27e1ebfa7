//! Provider registry for dynamic provider resolution.

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use cryptofacade_common::{Error, Result};
use cryptofacade_runtime::RuntimeConfig;

use crate::provider::Provider;
use crate::software;

/// Factory function type for creating providers.
pub type ProviderFactory = Box<dyn Fn(Value) -> Result<Arc<Provider>> + Send + Sync>;

static DEFAULT_PROVIDER: OnceCell<Arc<Provider>> = OnceCell::new();

/// Registry for provider factories.
///
/// Factories are kept in registration order, which is also the priority
/// order used by [`resolve_default`](Self::resolve_default).
pub struct ProviderRegistry {
    factories: Vec<(String, ProviderFactory)>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Register a provider factory with the lowest priority so far.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - `AlreadyExists` if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) -> Result<()> {
        let name = name.into();
        if self.has_provider(&name) {
            return Err(Error::AlreadyExists(format!(
                "Provider '{}' is already registered",
                name
            )));
        }
        self.factories.push((name, factory));
        Ok(())
    }

    /// Resolve a provider by name and configuration.
    ///
    /// # Errors
    /// - `NotFound` if the provider is not registered
    /// - Whatever the factory reports for an invalid configuration
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<Provider>> {
        let factory = self
            .factories
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, factory)| factory)
            .ok_or_else(|| Error::NotFound(format!("Provider '{}' is not registered", name)))?;
        factory(config)
    }

    /// Resolve the first provider, in priority order, whose factory succeeds.
    ///
    /// Failing factories are logged and skipped.
    ///
    /// # Errors
    /// - `NotFound` if no factory succeeds
    pub fn resolve_default(&self, config: Value) -> Result<Arc<Provider>> {
        for (name, factory) in &self.factories {
            match factory(config.clone()) {
                Ok(provider) => {
                    debug!(provider = %name, "Resolved default provider");
                    return Ok(provider);
                }
                Err(e) => warn!(provider = %name, "Provider unavailable: {}", e),
            }
        }
        Err(Error::NotFound("No provider is available".to_string()))
    }

    /// Registered provider names in priority order.
    pub fn providers(&self) -> Vec<String> {
        self.factories.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.iter().any(|(registered, _)| registered == name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in providers.
pub fn create_default_registry() -> ProviderRegistry {
    let software: ProviderFactory = Box::new(|config| {
        let config = RuntimeConfig::from_value(config)?;
        Ok(Arc::new(software::provider(&config)?))
    });

    ProviderRegistry {
        factories: vec![(software::NAME.to_string(), software)],
    }
}

/// Process-wide default provider, resolved once from the default registry
/// with the default configuration.
pub fn default_provider() -> Result<Arc<Provider>> {
    DEFAULT_PROVIDER
        .get_or_try_init(|| create_default_registry().resolve_default(Value::Null))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofacade_crypto::ids;
    use serde_json::json;

    fn failing() -> ProviderFactory {
        Box::new(|_| Err(Error::OperationNotSupported("no engine here".to_string())))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = create_default_registry();
        let provider = registry.resolve("software", Value::Null).unwrap();
        assert_eq!(provider.name(), "software");
        assert!(provider.supports(&ids::SHA256));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = create_default_registry();
        let result = registry.register("software", failing());
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = ProviderRegistry::new();
        let result = registry.resolve("unknown", Value::Null);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_resolve_default_skips_failing_factories() {
        let mut registry = ProviderRegistry::new();
        registry.register("hardware", failing()).unwrap();
        registry
            .register(
                "software",
                Box::new(|config| {
                    let config = RuntimeConfig::from_value(config)?;
                    Ok(Arc::new(software::provider(&config)?))
                }),
            )
            .unwrap();

        assert_eq!(registry.providers(), vec!["hardware", "software"]);
        let provider = registry.resolve_default(Value::Null).unwrap();
        assert_eq!(provider.name(), "software");
    }

    #[test]
    fn test_resolve_default_with_nothing_available() {
        let mut registry = ProviderRegistry::new();
        registry.register("hardware", failing()).unwrap();
        assert!(matches!(
            registry.resolve_default(Value::Null),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_configuration_reaches_provider() {
        let registry = create_default_registry();
        let provider = registry
            .resolve(
                "software",
                json!({ "pool_capacity": 2, "execution": { "mode": "workers", "threads": 1 } }),
            )
            .unwrap();

        assert_eq!(provider.state().pools().capacity(), 2);
        assert_eq!(provider.state().executor().name(), "workers");
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let registry = create_default_registry();
        let result = registry.resolve("software", json!({ "execution": { "mode": "gpu" } }));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_default_provider_is_shared() {
        let first = default_provider().unwrap();
        let second = default_provider().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
