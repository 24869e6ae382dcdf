//! Frontmatter extraction and rendering.
//!
//! Validator sources declare their metadata in a leading block:
//!
//! ```text
//! """
//! ---
//! title: Deduplication Validator
//! description: Detects duplicate chat samples.
//! tags: [gate2]
//! ---
//! """
//! ```
//!
//! The block must open the document. Leading whitespace is tolerated, as is a
//! single docstring delimiter line (`"""` or `'''`) in front of the opening
//! `---`, since plugin sources wrap their metadata in a module docstring.
//!
//! Extraction never fails: a missing or unparsable block yields an empty
//! mapping, so an undocumented plugin is still loadable.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Parsed frontmatter: `title`, `type`, `enabled`, `stage`, `description`,
/// `tags`, `options` plus any extra keys, preserved verbatim.
pub type Frontmatter = serde_json::Map<String, JsonValue>;

lazy_static! {
    static ref FRONTMATTER_BLOCK: Regex = Regex::new(
        r#"\A\s*(?:(?:"""|''')[ \t]*\r?\n\s*)?---[ \t]*\r?\n((?s:.*?))\r?\n---"#
    )
    .unwrap();
}

/// Why a frontmatter block could not be used.
#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Failed to parse frontmatter YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Frontmatter is not a mapping")]
    NotAMapping,
}

/// Extract the frontmatter mapping from a document.
///
/// Returns an empty mapping when no block is present or the block is not a
/// YAML mapping.
pub fn extract(document: &str) -> Frontmatter {
    match try_extract(document) {
        Ok(Some(front)) => front,
        Ok(None) => Frontmatter::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed frontmatter");
            Frontmatter::new()
        }
    }
}

/// Extract the frontmatter mapping, distinguishing "absent" from "malformed".
pub fn try_extract(document: &str) -> Result<Option<Frontmatter>, FrontmatterError> {
    let Some(caps) = FRONTMATTER_BLOCK.captures(document) else {
        return Ok(None);
    };
    let body = caps.get(1).map_or("", |m| m.as_str());

    match serde_yaml::from_str::<JsonValue>(body)? {
        JsonValue::Object(map) => Ok(Some(map)),
        // An empty body parses as null
        JsonValue::Null => Ok(Some(Frontmatter::new())),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// Render a mapping back into a `---` delimited block.
///
/// `extract(&render(m)) == m` for any mapping of YAML-representable values.
pub fn render(front: &Frontmatter) -> String {
    match serde_yaml::to_string(front) {
        Ok(body) => format!("---\n{}---\n", body),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render frontmatter, emitting empty block");
            "---\n{}\n---\n".to_string()
        }
    }
}

/// True when the mapping declares both `title` and `description`, the
/// minimum for a file to count as a validator definition.
pub fn declares_title_and_description(front: &Frontmatter) -> bool {
    front.contains_key("title") && front.contains_key("description")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const PLUGIN_SOURCE: &str = r#""""
---
title: Deduplication Validator
description: Detects duplicate chat samples by comparing full message arrays.
tags: [decontamination, deduplication, gate2]
options:
  threshold: 0.9
---
"""

class DeduplicationValidator(BaseValidator):
    pass
"#;

    #[test]
    fn test_extract_docstring_wrapped_block() {
        let front = extract(PLUGIN_SOURCE);
        assert_eq!(front["title"], "Deduplication Validator");
        assert_eq!(
            front["tags"],
            json!(["decontamination", "deduplication", "gate2"])
        );
        assert_eq!(front["options"]["threshold"], 0.9);
    }

    #[test]
    fn test_extract_plain_block_with_leading_whitespace() {
        let doc = "\n\n  ---\ntitle: Plain\ntype: base\n---\nbody text\n";
        let front = extract(doc);
        assert_eq!(front["title"], "Plain");
        assert_eq!(front["type"], "base");
    }

    #[test]
    fn test_extract_preserves_extra_keys() {
        let front = extract("---\ntitle: T\nowner: data-team\n---\n");
        assert_eq!(front["owner"], "data-team");
    }

    #[test]
    fn test_missing_block_is_empty() {
        assert!(extract("import os\nprint('no metadata')\n").is_empty());
        assert!(matches!(try_extract("no block"), Ok(None)));
    }

    #[test]
    fn test_block_not_at_start_is_ignored() {
        let doc = "import os\n---\ntitle: Late\n---\n";
        assert!(extract(doc).is_empty());
    }

    #[test]
    fn test_malformed_yaml_degrades_to_empty() {
        let doc = "---\ntitle: [unclosed\n---\n";
        assert!(extract(doc).is_empty());
        assert!(try_extract(doc).is_err());
    }

    #[test]
    fn test_scalar_body_degrades_to_empty() {
        let doc = "---\njust a string\n---\n";
        assert!(extract(doc).is_empty());
        assert!(matches!(try_extract(doc), Err(FrontmatterError::NotAMapping)));
    }

    #[test]
    fn test_render_then_extract_round_trip() {
        let original = extract(PLUGIN_SOURCE);
        let rendered = render(&original);
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.ends_with("---\n"));
        assert_eq!(extract(&rendered), original);
    }

    #[test]
    fn test_render_empty_mapping_round_trips() {
        let empty = Frontmatter::new();
        assert_eq!(extract(&render(&empty)), empty);
    }

    #[test]
    fn test_declares_title_and_description() {
        assert!(declares_title_and_description(&extract(PLUGIN_SOURCE)));
        assert!(!declares_title_and_description(&extract(
            "---\ntitle: Only title\n---\n"
        )));
    }

    fn scalar() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            "v_[a-z0-9]{0,10}".prop_map(JsonValue::from),
            any::<i64>().prop_map(JsonValue::from),
            any::<bool>().prop_map(JsonValue::from),
        ]
    }

    fn value() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            scalar(),
            prop::collection::vec(scalar(), 0..4).prop_map(JsonValue::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_metadata_survives_a_synthesis_cycle(
            entries in prop::collection::btree_map("[a-z][a-z_]{0,8}", value(), 0..6)
        ) {
            let front: Frontmatter = entries.into_iter().collect();
            let document = format!("\"\"\"\n{}\"\"\"\nclass X: pass\n", render(&front));

            let first = extract(&document);
            prop_assert_eq!(&first, &front);
            prop_assert_eq!(extract(&render(&first)), first);
        }
    }
}
