//! Chat-style dataset model and wire normalization.
//!
//! On the wire an item is either `{"messages": [...]}` or a bare array of
//! message objects. Both shapes are accepted through [`RawDataItem`] and
//! normalized once into the canonical [`DataItem`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::report::ValidationErrorDetail;

/// Error code attached to details produced by dataset normalization.
pub const PARSE_ERROR_CODE: &str = "parse_error";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the message
    pub role: Role,

    /// Message text
    pub content: String,
}

impl Message {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One dataset sample: an ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataItem {
    pub messages: Vec<Message>,
}

impl DataItem {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Wire shape of a dataset item before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDataItem {
    /// `{"messages": [...]}`
    Wrapped { messages: Vec<Message> },

    /// `[{"role": ..., "content": ...}, ...]`
    Bare(Vec<Message>),
}

impl RawDataItem {
    /// Decode one item, producing a readable reason on failure.
    ///
    /// Dispatches on the JSON shape first so that errors name the offending
    /// field instead of the untagged enum.
    pub fn from_value(value: &JsonValue) -> Result<Self, String> {
        match value {
            JsonValue::Object(map) => {
                let messages = map
                    .get("messages")
                    .ok_or_else(|| "missing field `messages`".to_string())?;
                Vec::<Message>::deserialize(messages)
                    .map(|messages| RawDataItem::Wrapped { messages })
                    .map_err(|e| format!("invalid `messages`: {}", e))
            }
            JsonValue::Array(_) => Vec::<Message>::deserialize(value)
                .map(RawDataItem::Bare)
                .map_err(|e| format!("invalid message list: {}", e)),
            other => Err(format!(
                "expected an object with `messages` or a list of messages, found {}",
                json_kind(other)
            )),
        }
    }
}

impl From<RawDataItem> for DataItem {
    fn from(raw: RawDataItem) -> Self {
        match raw {
            RawDataItem::Wrapped { messages } | RawDataItem::Bare(messages) => {
                DataItem { messages }
            }
        }
    }
}

/// Canonical dataset: an ordered list of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    items: Vec<DataItem>,
}

impl Dataset {
    pub fn new(items: Vec<DataItem>) -> Self {
        Self { items }
    }

    /// Normalize a raw JSON payload into a dataset.
    ///
    /// Every non-conforming item is reported, each with its index, so that
    /// the caller sees all offending items at once.
    pub fn from_json(raw: &JsonValue) -> Result<Self, Vec<ValidationErrorDetail>> {
        let entries = match raw {
            JsonValue::Array(entries) => entries,
            other => {
                return Err(vec![ValidationErrorDetail::new(format!(
                    "Dataset must be a list of items, found {}",
                    json_kind(other)
                ))
                .with_field("dataset")
                .with_code(PARSE_ERROR_CODE)]);
            }
        };

        let mut items = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            match RawDataItem::from_value(entry) {
                Ok(raw_item) => items.push(DataItem::from(raw_item)),
                Err(reason) => errors.push(
                    ValidationErrorDetail::new(format!("Item {} is malformed: {}", index, reason))
                        .at_index(index)
                        .with_field("messages")
                        .with_code(PARSE_ERROR_CODE),
                ),
            }
        }

        if errors.is_empty() {
            Ok(Self { items })
        } else {
            Err(errors)
        }
    }

    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataItem> {
        self.items.iter()
    }
}

impl From<Vec<DataItem>> for Dataset {
    fn from(items: Vec<DataItem>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataItem;
    type IntoIter = std::slice::Iter<'a, DataItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}
