//! Process settings and the provider config file.
//!
//! [`Settings`] starts from built-in defaults and is overridden by `CHECKR_*`
//! environment variables. [`ProviderConfig`] holds one YAML section per
//! provider name; `${VAR}` references are expanded from the environment
//! before parsing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::http::HttpConfig;

/// Prefix of every settings environment variable.
pub const ENV_PREFIX: &str = "CHECKR_";

lazy_static! {
    static ref ENV_REFERENCE: Regex = Regex::new(r"\$\{(\w+)\}").unwrap();
}

/// Errors from loading settings or the provider config file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read provider config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse provider config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Provider config must be a mapping of provider sections")]
    NotAMapping,
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Active content provider (`mock`, `github`, `gitlab`, `backend`)
    pub provider_name: String,

    pub provider_config_path: PathBuf,

    /// Lifetime of a cached provider instance
    pub provider_cache_ttl: Duration,

    pub http_verify_ssl: bool,

    /// Per-request timeout for every outbound call
    pub request_timeout: Duration,

    pub log_level: String,

    /// Base URL relative delegation endpoints are resolved against
    pub public_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_name: "mock".to_string(),
            provider_config_path: PathBuf::from("config/provider.yaml"),
            provider_cache_ttl: Duration::from_secs(600),
            http_verify_ssl: true,
            request_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
            public_base_url: "http://127.0.0.1:5005/api/v0".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `CHECKR_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name.to_uppercase()));
        let mut settings = Self::default();

        if let Some(v) = var("provider_name") {
            settings.provider_name = v.trim().to_lowercase();
        }
        if let Some(v) = var("provider_config_path") {
            settings.provider_config_path = PathBuf::from(v);
        }
        if let Some(v) = var("provider_cache_ttl") {
            settings.provider_cache_ttl = parse_duration("provider_cache_ttl", &v)?;
        }
        if let Some(v) = var("http_verify_ssl") {
            settings.http_verify_ssl = parse_bool("http_verify_ssl", &v)?;
        }
        if let Some(v) = var("request_timeout") {
            settings.request_timeout = parse_duration("request_timeout", &v)?;
        }
        if let Some(v) = var("log_level") {
            settings.log_level = v;
        }
        if let Some(v) = var("public_base_url") {
            settings.public_base_url = v;
        }

        Ok(settings)
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.request_timeout,
            verify_ssl: self.http_verify_ssl,
        }
    }
}

/// Accepts humantime (`90s`, `10m`) or a bare number of seconds.
fn parse_duration(key: &str, value: &str) -> Result<Duration, SettingsError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|e| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Replace every `${VAR}` with the variable's value, or nothing if unset.
pub fn expand_env<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(raw, |caps: &Captures| lookup(&caps[1]).unwrap_or_default())
        .into_owned()
}

/// Per-provider configuration sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    sections: serde_json::Map<String, JsonValue>,
}

impl ProviderConfig {
    /// Load from a YAML file, expanding `${VAR}` from the process environment.
    ///
    /// A missing file yields an empty config: the `mock` and `backend`
    /// providers need no section.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw, |key| std::env::var(key).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No provider config file, using empty config");
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse YAML text after `${VAR}` expansion through `lookup`.
    pub fn from_yaml<F>(raw: &str, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env(raw, lookup);
        match serde_yaml::from_str::<JsonValue>(&expanded)? {
            JsonValue::Null => Ok(Self::default()),
            JsonValue::Object(sections) => Ok(Self { sections }),
            _ => Err(SettingsError::NotAMapping),
        }
    }

    /// The section for `provider`, or an empty object.
    pub fn section(&self, provider: &str) -> JsonValue {
        self.sections
            .get(provider)
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(Default::default()))
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.provider_name, "mock");
        assert_eq!(settings.provider_cache_ttl, Duration::from_secs(600));
        assert!(settings.http_verify_ssl);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("CHECKR_PROVIDER_NAME", "GitLab"),
            ("CHECKR_PROVIDER_CACHE_TTL", "2m"),
            ("CHECKR_HTTP_VERIFY_SSL", "false"),
            ("CHECKR_REQUEST_TIMEOUT", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.provider_name, "gitlab");
        assert_eq!(settings.provider_cache_ttl, Duration::from_secs(120));
        assert!(!settings.http_verify_ssl);
        assert_eq!(settings.http().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Settings::from_lookup(lookup(&[("CHECKR_HTTP_VERIFY_SSL", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("http_verify_ssl"));

        assert!(Settings::from_lookup(lookup(&[("CHECKR_REQUEST_TIMEOUT", "soon")])).is_err());
    }

    #[test]
    fn test_expand_env_replaces_known_and_blanks_unknown() {
        let expanded = expand_env(
            "token: ${TOKEN}\nother: '${MISSING}'",
            lookup(&[("TOKEN", "s3cret")]),
        );
        assert_eq!(expanded, "token: s3cret\nother: ''");
    }

    #[test]
    fn test_provider_sections() {
        let raw = r#"
gitlab:
  url: https://gitlab.example.com
  project_id: 42
  private_token: ${GITLAB_TOKEN}
github:
  repo: org/validators
"#;
        let config = ProviderConfig::from_yaml(raw, lookup(&[("GITLAB_TOKEN", "glpat-x")])).unwrap();

        assert_eq!(config.section("gitlab")["private_token"], "glpat-x");
        assert_eq!(config.section("gitlab")["project_id"], 42);
        assert_eq!(config.section("github")["repo"], "org/validators");
        assert_eq!(config.section("mock"), serde_json::json!({}));
        assert_eq!(config.providers().count(), 2);
    }

    #[test]
    fn test_non_mapping_config_is_rejected() {
        assert!(matches!(
            ProviderConfig::from_yaml("- a\n- b\n", lookup(&[])),
            Err(SettingsError::NotAMapping)
        ));
        assert_eq!(
            ProviderConfig::from_yaml("", lookup(&[])).unwrap(),
            ProviderConfig::default()
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "github:\n  repo: org/repo\n  ref: dev").unwrap();

        let config = ProviderConfig::load(file.path()).unwrap();
        assert_eq!(config.section("github")["ref"], "dev");
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }
}
