//! JSON Schema validation for provider config sections.
//!
//! Sections are checked against `schema/provider-config.schema.json` before a
//! factory builds a provider, so a typo surfaces as a config error instead of
//! a failed listing.

use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use super::ProviderError;

/// Embedded provider config schema (loaded at compile time).
const PROVIDER_SCHEMA_JSON: &str = include_str!("../../schema/provider-config.schema.json");

/// Compiled validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, ProviderError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema: JsonValue = serde_json::from_str(PROVIDER_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| ProviderError::InvalidConfig(e.clone()))
}

/// Validate the config section of `provider`.
///
/// Providers without a schema entry accept any object.
pub fn validate_provider_section(provider: &str, section: &JsonValue) -> Result<(), ProviderError> {
    let validator = get_validator()?;
    let mut document = serde_json::Map::new();
    document.insert(provider.to_string(), section.clone());
    let document = JsonValue::Object(document);

    let errors: Vec<String> = validator
        .iter_errors(&document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::InvalidConfig(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_sections_pass() {
        assert!(validate_provider_section("github", &json!({"repo": "org/validators"})).is_ok());
        assert!(validate_provider_section(
            "gitlab",
            &json!({"url": "https://gitlab.example.com", "project_id": 42, "ref": "dev"})
        )
        .is_ok());
        assert!(validate_provider_section(
            "gitlab",
            &json!({"url": "https://gitlab.example.com", "project_id": "group/validators"})
        )
        .is_ok());
        assert!(validate_provider_section("mock", &json!({})).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let err = validate_provider_section("gitlab", &json!({"url": "https://gitlab.example.com"}))
            .unwrap_err();
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn test_malformed_repo_fails() {
        assert!(validate_provider_section("github", &json!({"repo": "no-slash"})).is_err());
        assert!(validate_provider_section("github", &json!({"repo": "a/b", "api_url": "ftp://x"})).is_err());
    }

    #[test]
    fn test_unknown_provider_accepts_any_object() {
        assert!(validate_provider_section("custom", &json!({"anything": [1, 2]})).is_ok());
    }
}
