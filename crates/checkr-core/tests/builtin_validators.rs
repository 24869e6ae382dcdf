use checkr_core::{
    validators, BackendRegistry, DatasetValidator, Options, ProgressReporter, ValidationStatus,
    ValidatorKind,
};
use serde_json::json;

const DEDUP: &str = "backend/gate2_deduplication_and_decontamination/deduplication_validator.rs";
const MOCK: &str = "backend/mock/mock_validator.rs";

fn registry() -> BackendRegistry {
    BackendRegistry::discover(validators::builtin_plugins())
}

#[test]
fn builtin_plugins_register_without_skips() {
    let registry = registry();
    assert!(registry.skipped().is_empty());
    assert!(registry.contains(DEDUP));
    assert!(registry.contains(MOCK));

    let dedup = registry.get(DEDUP).unwrap();
    assert_eq!(dedup.descriptor.kind, ValidatorKind::DatasetBackend);
    assert_eq!(dedup.descriptor.title, "Deduplication Validator");
    assert_eq!(dedup.class_name, "DeduplicationValidator");
}

#[test]
fn mock_is_registered_but_not_public() {
    let public: Vec<_> = registry()
        .public_descriptors()
        .into_iter()
        .map(|d| d.source)
        .collect();
    assert!(public.contains(&DEDUP.to_string()));
    assert!(!public.contains(&MOCK.to_string()));
}

#[tokio::test]
async fn dedup_passes_single_conversation() {
    let validator = registry()
        .instantiate(DEDUP, &Options::new(), ProgressReporter::silent())
        .unwrap();

    let result = validator
        .validate(&json!([{"messages": [
            {"role": "user", "content": "Hello!"},
            {"role": "assistant", "content": "Hi there!"}
        ]}]))
        .await;

    assert_eq!(result.status, ValidationStatus::Passed);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn dedup_flags_second_identical_item() {
    let item = json!({"messages": [
        {"role": "user", "content": "Hello!"},
        {"role": "assistant", "content": "Hi there!"}
    ]});
    let validator = registry()
        .instantiate(DEDUP, &Options::new(), ProgressReporter::silent())
        .unwrap();

    let result = validator.validate(&json!([item.clone(), item])).await;

    assert_eq!(result.status, ValidationStatus::Failed);
    assert_eq!(result.validator, "DeduplicationValidator");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].index, Some(1));
    assert_eq!(result.errors[0].code.as_deref(), Some("duplicate_sample"));
}

#[tokio::test]
async fn mock_always_passes() {
    let validator = registry()
        .instantiate(MOCK, &Options::new(), ProgressReporter::silent())
        .unwrap();
    let result = validator.validate(&json!([[{"role": "user", "content": "x"}]])).await;
    assert!(result.is_passed());
}
