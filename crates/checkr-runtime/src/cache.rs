//! Provider instance cache.
//!
//! Content providers are built lazily on first use of a name and reused
//! until their age exceeds the configured TTL, after which the next request
//! builds a replacement. A provider's listing snapshot lives exactly as long
//! as its instance, so expiry is also how remote listings are refreshed.
//!
//! Concurrent misses for the same name are coalesced: one caller builds the
//! provider, the rest await its result.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::providers::{ContentProvider, ProviderError, ProviderRegistry, ProviderServices};
use crate::settings::ProviderConfig;

/// Default time-to-live of a cached provider.
pub const DEFAULT_PROVIDER_TTL: Duration = Duration::from_secs(600);

/// A provider together with its construction time.
pub struct CachedProvider {
    pub provider: Arc<dyn ContentProvider>,
    pub created_at: DateTime<Utc>,
}

impl CachedProvider {
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Name-keyed cache of content provider instances.
pub struct ProviderCache {
    cache: Cache<String, Arc<CachedProvider>>,
    registry: Arc<ProviderRegistry>,
    config: ProviderConfig,
    services: ProviderServices,
    ttl: Duration,
}

impl ProviderCache {
    pub fn new(
        ttl: Duration,
        registry: Arc<ProviderRegistry>,
        config: ProviderConfig,
        services: ProviderServices,
    ) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();
        Self {
            cache,
            registry,
            config,
            services,
            ttl,
        }
    }

    /// The current provider for `name`, building one on a miss.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        self.entry(name).await.map(|cached| Arc::clone(&cached.provider))
    }

    /// The cached entry for `name`, building one on a miss.
    pub async fn entry(&self, name: &str) -> Result<Arc<CachedProvider>, ProviderError> {
        self.cache
            .try_get_with(name.to_string(), async {
                let provider = self
                    .registry
                    .create(name, &self.config.section(name), &self.services)?;
                tracing::debug!(provider = name, ttl = ?self.ttl, "Cached new provider instance");
                Ok::<_, ProviderError>(Arc::new(CachedProvider {
                    provider,
                    created_at: Utc::now(),
                }))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCache")
            .field("ttl", &self.ttl)
            .field("registry", &self.registry)
            .finish()
    }
}
