//! Validation dispatcher.
//!
//! Resolves the merged catalog (active provider first, then the public
//! backend registry), serves descriptor and source lookups, and runs
//! multi-gate validations against the backend registry.
//!
//! Unknown gates fail the whole request before any validator is built.
//! Gates then run sequentially in request order, each with a fresh instance.

use checkr_core::{
    AggregateResult, BackendRegistry, Dataset, Options, ProgressReporter, ValidationErrorDetail,
    ValidationResult, ValidatorDescriptor, ValidatorKind,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::ProviderCache;
use crate::http::HttpClient;
use crate::plugins;
use crate::providers::{
    BackendProvider, ContentProvider, ProviderError, ProviderRegistry, ProviderServices,
};
use crate::remote::RemoteEnvironment;
use crate::settings::{ProviderConfig, Settings, SettingsError};

/// Errors surfaced to dispatcher callers.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown gates requested: {}", .0.join(", "))]
    UnknownGates(Vec<String>),

    #[error("Invalid dataset: {}", summarize(.0))]
    InvalidDataset(Vec<ValidationErrorDetail>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl DispatchError {
    /// The request itself was at fault.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::UnknownGates(_) | Self::InvalidDataset(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn summarize(errors: &[ValidationErrorDetail]) -> String {
    errors
        .iter()
        .map(|e| match e.index {
            Some(i) => format!("item {}: {}", i, e.error),
            None => e.error.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Request-path entry point over the registry and the active provider.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    providers: ProviderCache,
    provider_name: String,
    backend: BackendProvider,
    progress: ProgressReporter,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<BackendRegistry>,
        providers: ProviderCache,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            backend: BackendProvider::new(Arc::clone(&registry)),
            registry,
            providers,
            provider_name: provider_name.into(),
            progress: ProgressReporter::silent(),
        }
    }

    /// Wire everything from settings: HTTP client, plugin table, provider
    /// config and cache.
    ///
    /// Fails early when the active provider is unknown or its config section
    /// does not match the provider config schema.
    pub fn from_settings(settings: &Settings) -> Result<Self, DispatchError> {
        let http = Arc::new(HttpClient::new(settings.http()).map_err(ProviderError::from)?);
        let environment = RemoteEnvironment::new(Arc::clone(&http) as _)
            .with_base_url(settings.public_base_url.clone());
        let registry = Arc::new(BackendRegistry::discover(plugins::builtin_plugins(
            &environment,
        )));

        let config = ProviderConfig::load(&settings.provider_config_path)?;
        let factories = Arc::new(ProviderRegistry::with_defaults());
        factories.validate(&settings.provider_name, &config.section(&settings.provider_name))?;

        let services = ProviderServices {
            http,
            registry: Arc::clone(&registry),
        };
        let providers =
            ProviderCache::new(settings.provider_cache_ttl, factories, config, services);

        tracing::info!(
            provider = %settings.provider_name,
            backend_validators = registry.len(),
            ttl = ?settings.provider_cache_ttl,
            "Dispatcher ready"
        );
        Ok(Self::new(registry, providers, settings.provider_name.clone()))
    }

    /// Forward validator progress to `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The current instance of the active provider.
    pub async fn provider(&self) -> Result<Arc<dyn ContentProvider>, DispatchError> {
        Ok(self.providers.get(&self.provider_name).await?)
    }

    /// Remote descriptors first, then public backend descriptors not already listed.
    pub async fn list_catalog(&self) -> Result<Vec<ValidatorDescriptor>, DispatchError> {
        let mut catalog = self
            .provider()
            .await?
            .list_validators()
            .await
            .inspect_err(|e| {
                tracing::error!(provider = %self.provider_name, error = %e, "Provider listing failed")
            })?;
        let mut seen: HashSet<String> = catalog.iter().map(|d| d.source.clone()).collect();

        for descriptor in self.registry.public_descriptors() {
            if seen.insert(descriptor.source.clone()) {
                catalog.push(descriptor);
            }
        }
        Ok(catalog)
    }

    pub async fn get_descriptor(&self, source: &str) -> Result<ValidatorDescriptor, DispatchError> {
        self.list_catalog()
            .await?
            .into_iter()
            .find(|d| d.source == source)
            .ok_or_else(|| DispatchError::NotFound(source.to_string()))
    }

    /// Source text of a catalog entry.
    ///
    /// Backend entries are served by the backend provider as proxy documents,
    /// everything else by the active provider.
    pub async fn fetch_source(&self, source: &str) -> Result<String, DispatchError> {
        let descriptor = self.get_descriptor(source).await?;
        let text = match descriptor.kind {
            ValidatorKind::DatasetBackend => self.backend.fetch_source(source).await?,
            _ => self.provider().await?.fetch_source(source).await?,
        };

        if text.is_empty() {
            return Err(DispatchError::NotFound(source.to_string()));
        }
        Ok(text)
    }

    /// Base definitions of the active provider, keyed by relative path.
    pub async fn fetch_base_sources(&self) -> Result<BTreeMap<String, String>, DispatchError> {
        Ok(self.provider().await?.fetch_base_sources().await?)
    }

    /// Run `gates` over `dataset` and merge their findings.
    pub async fn validate(
        &self,
        gates: &[String],
        dataset: &JsonValue,
        options: &Options,
    ) -> Result<AggregateResult, DispatchError> {
        let unknown = self.registry.unknown(gates.iter().map(String::as_str));
        if !unknown.is_empty() {
            tracing::info!(unknown = ?unknown, "Rejecting validation with unknown gates");
            return Err(DispatchError::UnknownGates(unknown));
        }

        let dataset = Dataset::from_json(dataset).map_err(DispatchError::InvalidDataset)?;

        let mut results: Vec<ValidationResult> = Vec::with_capacity(gates.len());
        for gate in gates {
            let result = match self.registry.instantiate(gate, options, self.progress.clone()) {
                Ok(validator) => validator.validate_dataset(&dataset).await,
                Err(e) => {
                    tracing::warn!(gate = %gate, error = %e, "Failed to construct validator");
                    ValidationResult::failure(gate.as_str(), e.to_string())
                }
            };
            results.push(result);
        }

        let aggregate = AggregateResult::merge(gates.to_vec(), results.iter());
        tracing::info!(
            gates = gates.len(),
            items = dataset.len(),
            errors = aggregate.errors.len(),
            status = ?aggregate.status,
            "Validation complete"
        );
        Ok(aggregate)
    }

    /// Single-gate validation, the route synthesized proxies call.
    pub async fn validate_gate(
        &self,
        source: &str,
        dataset: &JsonValue,
        options: &Options,
    ) -> Result<AggregateResult, DispatchError> {
        self.validate(&[source.to_string()], dataset, options).await
    }
}
