//! # checkr-runtime
//!
//! Network-facing half of Checkr.
//!
//! `checkr-core` defines the catalog model and the validator contract; this
//! crate connects them to the outside world:
//!
//! - [`remote`]: delegation clients that forward a dataset to a remote
//!   validation endpoint, in batch or one item at a time
//! - [`providers`]: content providers listing frontend validator definitions
//!   (mock, GitHub, GitLab) plus the backend virtual provider
//! - [`cache`]: time-bounded reuse of provider instances
//! - [`dispatcher`]: the request path (catalog, source lookup, validation)
//! - [`settings`]: environment-driven settings and the provider config file
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkr_runtime::{Dispatcher, Settings};
//!
//! let dispatcher = Dispatcher::from_settings(&Settings::from_env()?)?;
//! for descriptor in dispatcher.list_catalog().await? {
//!     println!("{} ({})", descriptor.title, descriptor.source);
//! }
//!
//! let result = dispatcher
//!     .validate(&gates, &serde_json::json!([]), &Default::default())
//!     .await?;
//! assert!(result.is_ok());
//! ```

pub mod cache;
pub mod dispatcher;
pub mod http;
pub mod plugins;
pub mod providers;
pub mod remote;
pub mod settings;

pub use cache::{CachedProvider, ProviderCache, DEFAULT_PROVIDER_TTL};
pub use dispatcher::{DispatchError, Dispatcher};
pub use http::{HttpClient, HttpConfig, HttpResponse, HttpTransport, TransportError};
pub use providers::{
    ContentProvider, ProviderError, ProviderFactory, ProviderRegistry, ProviderServices,
};
pub use remote::{RemoteEnvironment, RemotePerItemValidator, RemoteValidator};
pub use settings::{ProviderConfig, Settings, SettingsError};
