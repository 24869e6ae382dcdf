use async_trait::async_trait;
use checkr_core::{Options, ValidatorDescriptor, ValidatorKind, MOCK_TAG};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ContentProvider, ProviderError, ProviderFactory, ProviderServices};

/// The only source the mock provider knows.
pub const MOCK_SOURCE: &str = "mock/mock-validator.py";

/// Source text served for [`MOCK_SOURCE`].
pub const MOCK_SOURCE_TEXT: &str = "Mock content";

/// Static provider for tests and the default configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProvider;

impl MockProvider {
    pub fn descriptor() -> ValidatorDescriptor {
        ValidatorDescriptor {
            source: MOCK_SOURCE.to_string(),
            kind: ValidatorKind::DatasetFrontend,
            title: "mock validator".to_string(),
            enabled: true,
            stage: "mock".to_string(),
            description: "This is a mock validator for testing purposes.".to_string(),
            tags: vec![MOCK_TAG.to_string()],
            options: Options::new(),
        }
    }
}

#[async_trait]
impl ContentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_validators(&self) -> Result<Vec<ValidatorDescriptor>, ProviderError> {
        Ok(vec![Self::descriptor()])
    }

    async fn fetch_source(&self, source: &str) -> Result<String, ProviderError> {
        if source == MOCK_SOURCE {
            Ok(MOCK_SOURCE_TEXT.to_string())
        } else {
            Ok(String::new())
        }
    }

    async fn fetch_base_sources(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(BTreeMap::new())
    }
}

pub struct MockProviderFactory;

impl ProviderFactory for MockProviderFactory {
    fn provider_type(&self) -> &'static str {
        "mock"
    }

    fn create(
        &self,
        _config: &JsonValue,
        _services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        Ok(Arc::new(MockProvider))
    }

    fn description(&self) -> &'static str {
        "Static single-validator provider for tests"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_single_frontend_descriptor() {
        let listed = MockProvider.list_validators().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source, MOCK_SOURCE);
        assert_eq!(listed[0].kind, ValidatorKind::DatasetFrontend);
        assert_eq!(listed[0].stage, "mock");
    }

    #[tokio::test]
    async fn test_fetch_source_is_idempotent() {
        let first = MockProvider.fetch_source(MOCK_SOURCE).await.unwrap();
        let second = MockProvider.fetch_source(MOCK_SOURCE).await.unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_source_is_empty() {
        assert_eq!(MockProvider.fetch_source("mock/does-not-exist.py").await.unwrap(), "");
        assert!(MockProvider.fetch_base_sources().await.unwrap().is_empty());
    }
}
