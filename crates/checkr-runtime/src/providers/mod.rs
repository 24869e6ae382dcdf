//! Content providers.
//!
//! A provider lists frontend validator definitions held by some content host
//! and serves their source text. Implementations:
//!
//! - [`MockProvider`]: one fixed descriptor, for tests and the default config
//! - [`GithubProvider`] / [`GitlabProvider`]: walk a repository tree
//! - [`BackendProvider`]: the in-process registry, exposed as synthesized proxies
//!
//! Providers are created by name through the [`ProviderRegistry`].
//!
//! ## Security
//!
//! Access tokens are held in [`ApiCredential`] and never appear in logs.

use async_trait::async_trait;
use checkr_core::{BackendRegistry, SkippedEntry, ValidatorDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::http::{HttpClient, TransportError};

mod backend;
mod factory;
mod mock;
mod schema;
pub mod secrets;
mod snapshot;

#[cfg(feature = "github")]
mod github;
#[cfg(feature = "gitlab")]
mod gitlab;

pub use backend::{BackendProvider, BackendProviderFactory};
pub use factory::{ProviderFactory, ProviderRegistry};
pub use mock::{MockProvider, MockProviderFactory, MOCK_SOURCE, MOCK_SOURCE_TEXT};
pub use schema::validate_provider_section;
pub use secrets::{ApiCredential, CredentialSource};
pub use snapshot::Snapshot;

#[cfg(feature = "github")]
pub use github::{GithubProvider, GithubProviderFactory};
#[cfg(feature = "gitlab")]
pub use gitlab::{GitlabProvider, GitlabProviderFactory};

/// File extension of frontend validator definitions on content hosts.
pub const DEFAULT_EXTENSION: &str = ".py";

/// Errors from content providers.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] TransportError),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// A source of validator definitions.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Provider name, also the prefix of every `source` it emits.
    fn name(&self) -> &str;

    /// Non-base descriptors. Remote flavors walk the host once per instance.
    async fn list_validators(&self) -> Result<Vec<ValidatorDescriptor>, ProviderError>;

    /// Source text for `source` (provider prefix optional).
    ///
    /// Unknown identifiers yield an empty string.
    async fn fetch_source(&self, source: &str) -> Result<String, ProviderError>;

    /// Base definitions, keyed by path relative to the parent of the root path.
    async fn fetch_base_sources(&self) -> Result<BTreeMap<String, String>, ProviderError>;

    /// Entries skipped while building the current listing.
    fn skipped_entries(&self) -> Vec<SkippedEntry> {
        Vec::new()
    }
}

/// Shared services handed to provider factories.
#[derive(Clone)]
pub struct ProviderServices {
    pub http: Arc<HttpClient>,
    pub registry: Arc<BackendRegistry>,
}

impl std::fmt::Debug for ProviderServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderServices")
            .field("http", &self.http)
            .field("registry", &self.registry.len())
            .finish()
    }
}

/// Strip `"{prefix}/"` from `source` if present.
pub(crate) fn strip_prefix<'a>(source: &'a str, prefix: &str) -> &'a str {
    source
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("gitlab/validators/a.py", "gitlab"), "validators/a.py");
        assert_eq!(strip_prefix("validators/a.py", "gitlab"), "validators/a.py");
        assert_eq!(strip_prefix("gitlabber/a.py", "gitlab"), "gitlabber/a.py");
    }
}
