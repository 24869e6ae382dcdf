//! GitLab provider.
//!
//! Walks the repository tree one directory at a time (paginated), reads files
//! through the files API and resolves symbolic links to their targets.
//!
//! A symlink entry (mode `120000`) is listed under its own path with the
//! content of its target. The target is resolved relative to the link's
//! directory; a target escaping the repository root, or one that cannot be
//! fetched, is skipped with a warning.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use checkr_core::{SkippedEntry, ValidatorDescriptor};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::secrets::{token_env_var, ApiCredential, TOKEN_KEY};
use super::{
    ContentProvider, ProviderError, ProviderFactory, ProviderServices, Snapshot, DEFAULT_EXTENSION,
};
use crate::http::HttpClient;

const PROVIDER: &str = "gitlab";

/// Git file mode of a symbolic link.
const SYMLINK_MODE: &str = "120000";

const PAGE_SIZE: &str = "100";

const FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ProjectId {
    Numeric(u64),
    Path(String),
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectId::Numeric(id) => write!(f, "{}", id),
            ProjectId::Path(path) => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GitlabConfig {
    url: String,

    project_id: ProjectId,

    #[serde(rename = "ref", default = "default_ref")]
    git_ref: String,

    #[serde(default)]
    path: String,

    #[serde(default = "default_extension")]
    extension: String,
}

fn default_ref() -> String {
    "main".to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,

    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    mode: String,
}

#[derive(Debug, Deserialize)]
struct FileBody {
    content: String,

    #[serde(default)]
    encoding: String,
}

/// A tree entry selected for fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    File(String),
    Link(String),
}

impl Entry {
    fn path(&self) -> &str {
        match self {
            Entry::File(path) | Entry::Link(path) => path,
        }
    }
}

/// Provider backed by a GitLab project.
pub struct GitlabProvider {
    config: GitlabConfig,
    credential: Option<ApiCredential>,
    http: Arc<HttpClient>,
    snapshot: OnceCell<Snapshot>,
}

impl fmt::Debug for GitlabProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitlabProvider")
            .field("url", &self.config.url)
            .field("project_id", &self.config.project_id)
            .field("ref", &self.config.git_ref)
            .field("credential", &self.credential)
            .finish()
    }
}

impl GitlabProvider {
    /// Build from a `gitlab` config section.
    pub fn from_config(config: &JsonValue, http: Arc<HttpClient>) -> Result<Self, ProviderError> {
        let mut parsed: GitlabConfig = serde_json::from_value(config.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("gitlab: {}", e)))?;
        parsed.path = parsed.path.trim_matches('/').to_string();

        Url::parse(&parsed.url)
            .map_err(|e| ProviderError::InvalidConfig(format!("gitlab url '{}': {}", parsed.url, e)))?;

        let credential =
            ApiCredential::optional(config, TOKEN_KEY, &token_env_var(PROVIDER), "GitLab token");
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

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(credential) = &self.credential {
            let mut value = HeaderValue::from_str(credential.expose())
                .map_err(|_| ProviderError::InvalidConfig("GitLab token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert("PRIVATE-TOKEN", value);
        }
        Ok(headers)
    }

    /// `{url}/api/v4/projects/{id}/repository/{segments..}`, each segment encoded.
    fn repository_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        let project = self.config.project_id.to_string();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidConfig(format!("gitlab url '{}' cannot be a base", self.config.url)))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", project.as_str(), "repository"])
            .extend(segments);
        Ok(url)
    }

    async fn list_directory(&self, dir: &str, headers: &HeaderMap) -> Result<Vec<TreeEntry>, ProviderError> {
        let mut entries = Vec::new();
        let mut page = "1".to_string();

        loop {
            let mut url = self.repository_url(&["tree"])?;
            url.query_pairs_mut()
                .append_pair("path", dir)
                .append_pair("ref", &self.config.git_ref)
                .append_pair("per_page", PAGE_SIZE)
                .append_pair("page", &page);

            let response = self.http.get(url.as_str(), headers).await?;
            if !response.is_success() {
                return Err(ProviderError::Status {
                    url: url.to_string(),
                    status: response.status,
                });
            }

            let batch: Vec<TreeEntry> = response.json().map_err(|e| ProviderError::Parse {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            entries.extend(batch);

            match response.header("x-next-page").map(str::trim) {
                Some(next) if !next.is_empty() && next != page => page = next.to_string(),
                _ => break,
            }
        }

        Ok(entries)
    }

    /// Every plugin file and plugin-named symlink under the root path.
    async fn walk(&self, headers: &HeaderMap) -> Result<Vec<Entry>, ProviderError> {
        let mut selected = Vec::new();
        let mut stack = vec![self.config.path.clone()];

        while let Some(dir) = stack.pop() {
            for entry in self.list_directory(&dir, headers).await? {
                match entry.kind.as_str() {
                    "tree" => stack.push(entry.path),
                    "blob" if entry.path.ends_with(&self.config.extension) => {
                        if entry.mode == SYMLINK_MODE {
                            selected.push(Entry::Link(entry.path));
                        } else {
                            selected.push(Entry::File(entry.path));
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(selected)
    }

    async fn fetch_file(&self, path: &str, headers: &HeaderMap) -> Result<String, ProviderError> {
        let mut url = self.repository_url(&["files", path])?;
        url.query_pairs_mut().append_pair("ref", &self.config.git_ref);

        let response = self.http.get(url.as_str(), headers).await?;
        if !response.is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let parse_error = |reason: String| ProviderError::Parse {
            url: url.to_string(),
            reason,
        };
        let body: FileBody = response.json().map_err(|e| parse_error(e.to_string()))?;
        if body.encoding != "base64" {
            return Ok(body.content);
        }

        let compact: String = body.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| parse_error(format!("invalid base64: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| parse_error(format!("invalid UTF-8: {}", e)))
    }

    /// Fetch an entry's content, following one level of symlink.
    async fn fetch_entry(&self, entry: &Entry, headers: &HeaderMap) -> Result<String, String> {
        match entry {
            Entry::File(path) => self.fetch_file(path, headers).await.map_err(|e| e.to_string()),
            Entry::Link(path) => {
                let target = self
                    .fetch_file(path, headers)
                    .await
                    .map_err(|e| format!("unreadable symlink: {}", e))?;
                let target = target.trim();
                let resolved = resolve_link(path, target)
                    .ok_or_else(|| format!("symlink target '{}' escapes repository root", target))?;

                tracing::debug!(link = %path, target = %resolved, "Resolved symlink");
                self.fetch_file(&resolved, headers)
                    .await
                    .map_err(|e| format!("unresolvable symlink target '{}': {}", resolved, e))
            }
        }
    }

    async fn load(&self) -> Result<Snapshot, ProviderError> {
        let headers = self.headers()?;
        let entries = self.walk(&headers).await?;
        tracing::info!(
            project = %self.config.project_id,
            files = entries.len(),
            "Fetching GitLab validator sources"
        );

        let fetched: Vec<(Entry, Result<String, String>)> = stream::iter(entries)
            .map(|entry| {
                let headers = &headers;
                async move {
                    let content = self.fetch_entry(&entry, headers).await;
                    (entry, content)
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut snapshot = Snapshot::new(PROVIDER, self.config.path.clone());
        for (entry, content) in fetched {
            match content {
                Ok(text) => snapshot.admit(entry.path(), text),
                Err(reason) => snapshot.skip(entry.path(), reason),
            }
        }
        Ok(snapshot)
    }

    async fn snapshot(&self) -> Result<&Snapshot, ProviderError> {
        self.snapshot.get_or_try_init(|| self.load()).await
    }
}

/// Resolve `target` relative to the directory of `link`.
///
/// Returns `None` for absolute targets and targets escaping the root.
fn resolve_link(link: &str, target: &str) -> Option<String> {
    if target.is_empty() || target.starts_with('/') {
        return None;
    }

    let mut parts: Vec<&str> = link.split('/').collect();
    parts.pop();

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ContentProvider for GitlabProvider {
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

pub struct GitlabProviderFactory;

impl ProviderFactory for GitlabProviderFactory {
    fn provider_type(&self) -> &'static str {
        PROVIDER
    }

    fn create(
        &self,
        config: &JsonValue,
        services: &ProviderServices,
    ) -> Result<Arc<dyn ContentProvider>, ProviderError> {
        Ok(Arc::new(GitlabProvider::from_config(
            config,
            Arc::clone(&services.http),
        )?))
    }

    fn description(&self) -> &'static str {
        "GitLab project via the repository tree and files APIs"
    }
}
