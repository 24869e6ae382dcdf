//! Provider factory pattern for name-based provider construction.
//!
//! Each provider type registers a factory; the active provider is then built
//! from its name and config section without a central switch.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("gitlab", &config.section("gitlab"), &services)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{ContentProvider, ProviderError, ProviderServices};

/// Builds content providers from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Unique provider name, also the `source` prefix of its validators.
    fn provider_type(&self) -> &'static str;

    /// Create a provider from its config section.
    fn create(
        &self,
        config: &JsonValue,
        services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError>;

    /// Validate a config section without building a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        super::validate_provider_section(self.provider_type(), config)
    }

    fn description(&self) -> &'static str {
        "Content provider"
    }
}

/// Registry of provider factories keyed by provider name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory with the same name.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Validate `config` and build the named provider.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
        services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        let factory = self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })?;

        factory.validate_config(config)?;
        tracing::info!(provider = provider_type, "Creating content provider");
        factory.create(config, services)
    }

    /// Validate a config section for a provider type.
    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factories
            .get(provider_type)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("Unknown provider type: '{}'", provider_type))
            })?
            .validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registry with every built-in provider enabled by crate features.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::MockProviderFactory));
        registry.register(Arc::new(super::BackendProviderFactory));
        #[cfg(feature = "github")]
        registry.register(Arc::new(super::GithubProviderFactory));
        #[cfg(feature = "gitlab")]
        registry.register(Arc::new(super::GitlabProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
