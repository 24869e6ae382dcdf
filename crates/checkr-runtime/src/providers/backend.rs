//! The in-process registry exposed through the provider interface.
//!
//! Source requests return a synthesized proxy document: a small Python
//! module that re-declares the plugin's frontmatter and subclasses the
//! browser-side remote validator with its endpoint fixed to the plugin's
//! validate-by-source route. A browser client loads it like any other
//! frontend validator and ends up calling back into this process.

use async_trait::async_trait;
use checkr_core::frontmatter;
use checkr_core::{
    BackendRegistry, RegisteredValidator, SkippedEntry, ValidatorDescriptor, BACKEND_SOURCE_PREFIX,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{strip_prefix, ContentProvider, ProviderError, ProviderFactory, ProviderServices};

/// Route prefix of the single-gate validate endpoint.
pub const VALIDATE_ROUTE: &str = "/validate";

/// Provider over the [`BackendRegistry`].
#[derive(Debug, Clone)]
pub struct BackendProvider {
    registry: Arc<BackendRegistry>,
}

impl BackendProvider {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Validate-by-source route for a registered plugin.
    pub fn endpoint_for(entry: &RegisteredValidator) -> String {
        format!("{}/{}/{}", VALIDATE_ROUTE, BACKEND_SOURCE_PREFIX, entry.path)
    }

    /// Proxy document for a registered plugin.
    pub fn synthesize(entry: &RegisteredValidator) -> String {
        format!(
            "\"\"\"\n{front}\"\"\"\n\
             from validators.base_remote_validator import BaseRemoteValidator\n\
             \n\
             class RemoteBackend{class}(BaseRemoteValidator):\n    \
             endpoint = '{endpoint}'\n",
            front = frontmatter::render(&entry.frontmatter),
            class = entry.class_name,
            endpoint = Self::endpoint_for(entry),
        )
    }
}

#[async_trait]
impl ContentProvider for BackendProvider {
    fn name(&self) -> &str {
        BACKEND_SOURCE_PREFIX
    }

    async fn list_validators(&self) -> Result<Vec<ValidatorDescriptor>, ProviderError> {
        Ok(self.registry.public_descriptors())
    }

    async fn fetch_source(&self, source: &str) -> Result<String, ProviderError> {
        let path = strip_prefix(source, BACKEND_SOURCE_PREFIX);
        Ok(self
            .registry
            .get_by_path(path)
            .map(|entry| Self::synthesize(entry))
            .unwrap_or_default())
    }

    async fn fetch_base_sources(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(BTreeMap::new())
    }

    fn skipped_entries(&self) -> Vec<SkippedEntry> {
        self.registry.skipped().to_vec()
    }
}

pub struct BackendProviderFactory;

impl ProviderFactory for BackendProviderFactory {
    fn provider_type(&self) -> &'static str {
        BACKEND_SOURCE_PREFIX
    }

    fn create(
        &self,
        _config: &JsonValue,
        services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        Ok(Arc::new(BackendProvider::new(Arc::clone(&services.registry))))
    }

    fn description(&self) -> &'static str {
        "In-process validators served as remote proxies"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkr_core::validators;

    const DEDUP: &str = "backend/gate2_deduplication_and_decontamination/deduplication_validator.rs";

    fn provider() -> BackendProvider {
        BackendProvider::new(Arc::new(BackendRegistry::discover(validators::builtin_plugins())))
    }

    #[tokio::test]
    async fn test_proxy_declares_class_and_endpoint() {
        let source = provider().fetch_source(DEDUP).await.unwrap();

        assert!(source.starts_with("\"\"\"\n---\n"));
        assert!(source.contains("from validators.base_remote_validator import BaseRemoteValidator"));
        assert!(source.contains("class RemoteBackendDeduplicationValidator(BaseRemoteValidator):"));
        assert!(source.contains(
            "    endpoint = '/validate/backend/gate2_deduplication_and_decontamination/deduplication_validator.rs'"
        ));
    }

    #[tokio::test]
    async fn test_proxy_frontmatter_survives_re_extraction() {
        let provider = provider();
        let source = provider.fetch_source(DEDUP).await.unwrap();
        let registry = BackendRegistry::discover(validators::builtin_plugins());
        let entry = registry.get(DEDUP).unwrap();

        assert_eq!(frontmatter::extract(&source), entry.frontmatter);
    }

    #[tokio::test]
    async fn test_unknown_source_is_empty() {
        assert_eq!(provider().fetch_source("backend/nope.rs").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_lists_public_descriptors_only() {
        let listed = provider().list_validators().await.unwrap();
        assert!(listed.iter().any(|d| d.source == DEDUP));
        assert!(listed.iter().all(|d| !d.has_tag("mock")));
    }
}
