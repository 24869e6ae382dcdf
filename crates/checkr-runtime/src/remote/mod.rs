//! Remote-delegation clients.
//!
//! Both variants implement [`DatasetValidator`](checkr_core::DatasetValidator)
//! and speak the same wire contract:
//!
//! - request: `{"dataset": [...], "options": {...}}` (per-item adds `"index"`)
//! - reply: `{"status": "passed" | "failed", "errors": [...]}`
//!
//! Transport problems and non-2xx replies never escape as errors; they become
//! `remote_http_error` details. A missing endpoint is an execution fault.

mod batch;
mod per_item;

pub use batch::RemoteValidator;
pub use per_item::RemotePerItemValidator;

use checkr_core::{Dataset, ValidationErrorDetail, ValidatorContext, ValidatorError};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use crate::http::{HttpResponse, HttpTransport};

/// Raised when the remote replied with an HTTP error status.
pub const REMOTE_HTTP_ERROR: &str = "remote_http_error";

/// A remote error entry (or the reply itself) could not be decoded.
pub const REMOTE_ERROR_PARSE: &str = "remote_error_parse";

/// A batch reply carried a non-object error entry.
pub const REMOTE_ERROR: &str = "remote_error";

/// A per-item reply carried a non-object error entry.
pub const REMOTE_ITEM_ERROR: &str = "remote_item_error";

/// Services injected into every delegation client.
#[derive(Clone)]
pub struct RemoteEnvironment {
    pub transport: Arc<dyn HttpTransport>,

    /// Base URL for relative endpoints when options carry no `base_url`
    pub base_url: Option<String>,
}

impl RemoteEnvironment {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

impl fmt::Debug for RemoteEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEnvironment")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Where a client sends its requests.
#[derive(Debug, Clone)]
pub(crate) struct EndpointSpec {
    /// Endpoint fixed by the client's definition, preferred over options
    pub fixed: Option<String>,
}

impl EndpointSpec {
    /// Resolve the absolute URL to POST to.
    pub fn resolve(
        &self,
        validator: &str,
        context: &ValidatorContext,
        environment: &RemoteEnvironment,
    ) -> Result<String, ValidatorError> {
        let endpoint = self
            .fixed
            .as_deref()
            .or_else(|| context.str_option("endpoint"))
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ValidatorError::MissingOption {
                validator: validator.to_string(),
                option: "endpoint",
            })?;

        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }

        let base = context
            .str_option("base_url")
            .or(environment.base_url.as_deref())
            .ok_or_else(|| ValidatorError::InvalidOption {
                option: "endpoint".to_string(),
                reason: format!("relative endpoint '{}' requires a base_url", endpoint),
            })?;

        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ))
    }
}

/// Reply body shared by both variants.
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteReply {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub errors: Vec<JsonValue>,
}

impl RemoteReply {
    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }
}

/// Serialize dataset items in their canonical `{"messages": [...]}` shape.
pub(crate) fn items_payload(dataset: &Dataset) -> Result<Vec<JsonValue>, ValidatorError> {
    dataset
        .iter()
        .map(|item| {
            serde_json::to_value(item)
                .map_err(|e| ValidatorError::Execution(format!("Failed to serialize dataset: {}", e)))
        })
        .collect()
}

/// Best-effort text for an HTTP error reply.
pub(crate) fn error_body(response: &HttpResponse) -> &str {
    if response.body.is_empty() {
        "<empty body>"
    } else {
        &response.body
    }
}

/// Convert one remote error entry into a detail.
///
/// Objects are decoded as details; `default_index` fills a missing index.
/// Anything else becomes a detail carrying its text and `fallback_code`.
pub(crate) fn decode_error_entry(
    entry: &JsonValue,
    default_index: Option<usize>,
    fallback_code: &str,
) -> ValidationErrorDetail {
    match entry {
        JsonValue::Object(fields) => {
            match serde_json::from_value::<ValidationErrorDetail>(entry.clone()) {
                Ok(mut detail) => {
                    let explicit = fields.get("index").is_some_and(|v| !v.is_null());
                    if !explicit {
                        detail.index = default_index;
                    }
                    detail
                }
                Err(e) => with_index(
                    ValidationErrorDetail::new(format!("Unexpected error format: {} ({})", entry, e))
                        .with_code(REMOTE_ERROR_PARSE),
                    default_index,
                ),
            }
        }
        JsonValue::String(text) => {
            with_index(ValidationErrorDetail::new(text.clone()), default_index).with_code(fallback_code)
        }
        other => {
            with_index(ValidationErrorDetail::new(other.to_string()), default_index).with_code(fallback_code)
        }
    }
}

pub(crate) fn with_index(detail: ValidationErrorDetail, index: Option<usize>) -> ValidationErrorDetail {
    match index {
        Some(i) => detail.at_index(i),
        None => detail,
    }
}
