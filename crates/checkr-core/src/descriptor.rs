//! Validator descriptors: identity and declarative metadata of one gate.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::frontmatter::Frontmatter;
use crate::Options;

/// Tag that hides a validator from the public catalog.
pub const MOCK_TAG: &str = "mock";

/// Stage assigned when the frontmatter declares none.
pub const DEFAULT_STAGE: &str = "experimental";

/// Errors when turning frontmatter into a descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Unknown validator type: '{0}'")]
    UnknownKind(String),

    #[error("Field '{field}' must be a {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Where a validator runs and whether it is publicly invokable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatorKind {
    /// Fetched from a content host; executes by proxying to the backend
    #[serde(rename = "dataset/frontend", alias = "dataset-frontend")]
    DatasetFrontend,

    /// Loaded and executed in-process
    #[serde(rename = "dataset/backend", alias = "dataset-backend")]
    DatasetBackend,

    #[serde(rename = "artifact")]
    Artifact,

    /// Reusable building block, never listed in the catalog
    #[serde(rename = "base")]
    Base,
}

impl ValidatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::DatasetFrontend => "dataset/frontend",
            ValidatorKind::DatasetBackend => "dataset/backend",
            ValidatorKind::Artifact => "artifact",
            ValidatorKind::Base => "base",
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorKind {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataset/frontend" | "dataset-frontend" => Ok(ValidatorKind::DatasetFrontend),
            "dataset/backend" | "dataset-backend" => Ok(ValidatorKind::DatasetBackend),
            "artifact" => Ok(ValidatorKind::Artifact),
            "base" => Ok(ValidatorKind::Base),
            other => Err(DescriptorError::UnknownKind(other.to_string())),
        }
    }
}

/// Identity and metadata for one validator.
///
/// `source` is globally unique across the merged catalog and doubles as the
/// token clients pass in gate lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    /// Unique identifier, e.g. `backend/gate2/dedup.rs` or `github/validators/x.py`
    pub source: String,

    #[serde(rename = "type")]
    pub kind: ValidatorKind,

    pub title: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form maturity label
    pub stage: String,

    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Declared default configuration
    #[serde(default)]
    pub options: Options,
}

fn default_enabled() -> bool {
    true
}

impl ValidatorDescriptor {
    /// Build a descriptor from a frontmatter mapping.
    ///
    /// # Arguments
    /// * `front` - Parsed frontmatter
    /// * `source` - Unique identifier for the validator
    /// * `default_kind` - Kind used when `type` is absent
    /// * `fallback_title` - Title used when `title` is absent (usually the file stem)
    pub fn from_frontmatter(
        front: &Frontmatter,
        source: impl Into<String>,
        default_kind: ValidatorKind,
        fallback_title: &str,
    ) -> Result<Self, DescriptorError> {
        let kind = match front.get("type") {
            None | Some(JsonValue::Null) => default_kind,
            Some(JsonValue::String(s)) => s.parse()?,
            Some(_) => {
                return Err(DescriptorError::InvalidField {
                    field: "type",
                    expected: "string",
                })
            }
        };

        let enabled = match front.get("enabled") {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::Bool(b)) => *b,
            Some(_) => {
                return Err(DescriptorError::InvalidField {
                    field: "enabled",
                    expected: "boolean",
                })
            }
        };

        let options = match front.get("options") {
            None | Some(JsonValue::Null) => Options::new(),
            Some(JsonValue::Object(map)) => map.clone(),
            Some(_) => {
                return Err(DescriptorError::InvalidField {
                    field: "options",
                    expected: "mapping",
                })
            }
        };

        Ok(Self {
            source: source.into(),
            kind,
            title: text_field(front, "title").unwrap_or_else(|| fallback_title.to_string()),
            enabled,
            stage: text_field(front, "stage").unwrap_or_else(|| DEFAULT_STAGE.to_string()),
            description: text_field(front, "description").unwrap_or_default(),
            tags: normalize_tags(front.get("tags")),
            options,
        })
    }

    pub fn is_base(&self) -> bool {
        self.kind == ValidatorKind::Base
    }

    /// Whether the descriptor carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Visible to catalog-listing callers: not base and not mock-tagged.
    pub fn is_public(&self) -> bool {
        !self.is_base() && !self.has_tag(MOCK_TAG)
    }
}

/// A catalog entry that was skipped during discovery, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

impl SkippedEntry {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Read a scalar field as text. Numbers and booleans are stringified; lists
/// and mappings count as absent.
fn text_field(front: &Frontmatter, key: &str) -> Option<String> {
    match front.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Tags may be a list, a single scalar, or absent.
fn normalize_tags(raw: Option<&JsonValue>) -> Vec<String> {
    fn tag_text(value: &JsonValue) -> Option<String> {
        match value {
            JsonValue::Null => None,
            JsonValue::String(s) if s.is_empty() => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    match raw {
        None => Vec::new(),
        Some(JsonValue::Array(items)) => items.iter().filter_map(tag_text).collect(),
        Some(scalar) => tag_text(scalar).into_iter().collect(),
    }
}
