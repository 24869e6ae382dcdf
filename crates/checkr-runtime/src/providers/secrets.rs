//! Access-token handling for content hosts.
//!
//! Tokens are wrapped in [`SecretString`] the moment they are read, so they
//! cannot leak through `Debug` or `Display`. A token is looked up in the
//! provider's config section first (`private_token`), then in the
//! `CHECKR_<PROVIDER>_TOKEN` environment variable.
//!
//! ```ignore
//! let token = ApiCredential::optional(&section, "private_token", "CHECKR_GITHUB_TOKEN", "GitHub token");
//! if let Some(token) = &token {
//!     headers.insert(AUTHORIZATION, format!("token {}", token.expose()).parse()?);
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

/// Config key holding a provider's access token.
pub const TOKEN_KEY: &str = "private_token";

/// Environment fallback for a provider's token, e.g. `CHECKR_GITLAB_TOKEN`.
pub fn token_env_var(provider: &str) -> String {
    format!("CHECKR_{}_TOKEN", provider.to_uppercase())
}

/// Where a token came from. Logged in place of the token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `private_token` in the provider section.
    Config,
    /// `CHECKR_<PROVIDER>_TOKEN`.
    Environment,
    /// Handed over directly by the caller.
    Inline,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Environment => "environment",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A securely stored access token.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Token from `config[config_key]`, else `env_var`, else `None`.
    ///
    /// Empty strings count as absent: `${VAR}` expansion of an unset variable
    /// leaves an empty value behind.
    pub fn optional(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.is_empty()) {
            return Some(Self::new(value, CredentialSource::Config, name));
        }

        std::env::var(env_var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment, name))
    }

    /// Expose the token at the point of use (an HTTP header).
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, hidden)", self.name, self.source)
    }
}
