//! GitHub provider.
//!
//! Lists the repository through the git trees API in one recursive call and
//! reads file bodies from the raw content host.

use async_trait::async_trait;
use checkr_core::{SkippedEntry, ValidatorDescriptor};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::secrets::{token_env_var, ApiCredential, TOKEN_KEY};
use super::{
    ContentProvider, ProviderError, ProviderFactory, ProviderServices, Snapshot, DEFAULT_EXTENSION,
};
use crate::http::HttpClient;

const PROVIDER: &str = "github";

/// Files fetched concurrently while building a listing.
const FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
struct GithubConfig {
    /// `owner/name`
    repo: String,

    #[serde(rename = "ref", default = "default_ref")]
    git_ref: String,

    #[serde(default)]
    path: String,

    #[serde(default = "default_api_url")]
    api_url: String,

    #[serde(default = "default_raw_url")]
    raw_url: String,

    #[serde(default = "default_extension")]
    extension: String,
}

fn default_ref() -> String {
    "main".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

#[derive(Debug, Deserialize)]
struct TreeListing {
    #[serde(default)]
    tree: Vec<TreeEntry>,

    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,

    #[serde(rename = "type")]
    kind: String,
}

/// Provider backed by a GitHub repository.
pub struct GithubProvider {
    config: GithubConfig,
    credential: Option<ApiCredential>,
    http: Arc<HttpClient>,
    snapshot: OnceCell<Snapshot>,
}

impl std::fmt::Debug for GithubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubProvider")
            .field("repo", &self.config.repo)
            .field("ref", &self.config.git_ref)
            .field("credential", &self.credential)
            .finish()
    }
}

impl GithubProvider {
    /// Build from a `github` config section.
    pub fn from_config(config: &JsonValue, http: Arc<HttpClient>) -> Result<Self, ProviderError> {
        let mut parsed: GithubConfig = serde_json::from_value(config.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("github: {}", e)))?;
        parsed.path = parsed.path.trim_matches('/').to_string();

        let credential =
            ApiCredential::optional(config, TOKEN_KEY, &token_env_var(PROVIDER), "GitHub token");
        if let Some(credential) = &credential {
            tracing::debug!(token = credential.name(), source = %credential.source(), "Using access token");
        }

        Ok(Self {
            config: parsed,
            credential,
            http,
            snapshot: OnceCell::new(),
        })
    }

    /// Headers for the raw content host: the token only.
    fn auth_headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(credential) = &self.credential {
            let mut value = HeaderValue::from_str(&format!("token {}", credential.expose()))
                .map_err(|_| ProviderError::InvalidConfig("GitHub token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn api_headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = self.auth_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Ok(headers)
    }

    /// `{raw_url}/{owner}/{name}/{ref}/{path}` with every segment encoded.
    fn raw_url(&self, path: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.raw_url)
            .map_err(|e| ProviderError::InvalidConfig(format!("github raw_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::InvalidConfig(format!(
                    "github raw_url '{}' cannot be a base",
                    self.config.raw_url
                ))
            })?
            .pop_if_empty()
            .extend(self.config.repo.split('/'))
            .extend(self.config.git_ref.split('/'))
            .extend(path.split('/'));
        Ok(url)
    }

    fn in_scope(&self, path: &str) -> bool {
        let root = &self.config.path;
        path.ends_with(&self.config.extension)
            && (root.is_empty() || path.starts_with(&format!("{}/", root)))
    }

    async fn walk(&self, headers: &HeaderMap) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            self.config.git_ref
        );
        let response = self.http.get(&url, headers).await?;
        if !response.is_success() {
            return Err(ProviderError::Status {
                url,
                status: response.status,
            });
        }

        let listing: TreeListing = response.json().map_err(|e| ProviderError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if listing.truncated {
            tracing::warn!(repo = %self.config.repo, "GitHub tree listing was truncated");
        }

        Ok(listing
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob" && self.in_scope(&entry.path))
            .map(|entry| entry.path)
            .collect())
    }

    async fn fetch_raw(&self, path: &str, headers: &HeaderMap) -> Result<String, ProviderError> {
        let url = self.raw_url(path)?;
        let response = self.http.get(url.as_str(), headers).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(ProviderError::Status {
                url: url.to_string(),
                status: response.status,
            })
        }
    }

    async fn load(&self) -> Result<Snapshot, ProviderError> {
        let files = self.walk(&self.api_headers()?).await?;
        let headers = self.auth_headers()?;
        tracing::info!(repo = %self.config.repo, files = files.len(), "Fetching GitHub validator sources");

        let fetched: Vec<(String, Result<String, ProviderError>)> = stream::iter(files)
            .map(|path| {
                let headers = &headers;
                async move {
                    let content = self.fetch_raw(&path, headers).await;
                    (path, content)
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut snapshot = Snapshot::new(PROVIDER, self.config.path.clone());
        for (path, content) in fetched {
            match content {
                Ok(text) => snapshot.admit(&path, text),
                Err(e) => snapshot.skip(&path, e.to_string()),
            }
        }
        Ok(snapshot)
    }

    async fn snapshot(&self) -> Result<&Snapshot, ProviderError> {
        self.snapshot.get_or_try_init(|| self.load()).await
    }
}

#[async_trait]
impl ContentProvider for GithubProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn list_validators(&self) -> Result<Vec<ValidatorDescriptor>, ProviderError> {
        Ok(self.snapshot().await?.validators().to_vec())
    }

    async fn fetch_source(&self, source: &str) -> Result<String, ProviderError> {
        Ok(self.snapshot().await?.source(source))
    }

    async fn fetch_base_sources(&self) -> Result<BTreeMap<String, String>, ProviderError> {
        Ok(self.snapshot().await?.base_sources())
    }

    fn skipped_entries(&self) -> Vec<SkippedEntry> {
        self.snapshot
            .get()
            .map(|s| s.skipped().to_vec())
            .unwrap_or_default()
    }
}

pub struct GithubProviderFactory;

impl ProviderFactory for GithubProviderFactory {
    fn provider_type(&self) -> &'static str {
        PROVIDER
    }

    fn create(
        &self,
        config: &JsonValue,
        services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        Ok(Arc::new(GithubProvider::from_config(
            config,
            Arc::clone(&services.http),
        )?))
    }

    fn description(&self) -> &'static str {
        "GitHub repository via the git trees API"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use serde_json::json;

    fn provider(config: JsonValue) -> GithubProvider {
        let http = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
        GithubProvider::from_config(&config, http).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let provider = provider(json!({"repo": "org/validators", "path": "/frontend/validators/"}));
        assert_eq!(provider.config.git_ref, "main");
        assert_eq!(provider.config.api_url, "https://api.github.com");
        assert_eq!(provider.config.path, "frontend/validators");
        assert_eq!(provider.config.extension, ".py");
    }

    #[test]
    fn test_scope_filter() {
        let provider = provider(json!({"repo": "org/validators", "path": "validators"}));
        assert!(provider.in_scope("validators/gate1/length.py"));
        assert!(!provider.in_scope("validators_old/length.py"));
        assert!(!provider.in_scope("validators/README.md"));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let provider = provider(json!({"repo": "org/validators", "private_token": "ghp_secret"}));
        let headers = provider.api_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "token ghp_secret");
        assert_eq!(headers[ACCEPT], "application/vnd.github.v3+json");
        assert!(!format!("{:?}", provider).contains("ghp_secret"));
    }

    #[test]
    fn test_raw_fetch_sends_only_the_token() {
        let provider = provider(json!({"repo": "org/validators", "private_token": "ghp_secret"}));
        let headers = provider.auth_headers().unwrap();
        assert_eq!(headers.len(), 1);
        assert!(headers.get(ACCEPT).is_none());
    }

    #[test]
    fn test_raw_url_encodes_path_segments() {
        let provider = provider(json!({
            "repo": "org/validators",
            "ref": "release/v2",
            "raw_url": "https://raw.example.com/content/",
        }));
        let url = provider.raw_url("validators/gate#1/what?.py").unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.example.com/content/org/validators/release/v2/validators/gate%231/what%3F.py"
        );
        assert!(url.fragment().is_none());
        assert!(url.query().is_none());
    }

    #[test]
    fn test_missing_repo_is_invalid() {
        let http = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
        assert!(matches!(
            GithubProvider::from_config(&json!({"ref": "main"}), http),
            Err(ProviderError::InvalidConfig(_))
        ));
    }
}
