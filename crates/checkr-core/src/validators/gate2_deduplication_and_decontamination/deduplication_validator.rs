//! Exact-duplicate detection over full message arrays.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::registry::PluginRegistration;
use crate::report::ValidationErrorDetail;
use crate::validator::{DatasetValidator, ProgressReporter, ValidatorContext, ValidatorError};

pub const MANIFEST: &str = r#"---
title: Deduplication Validator
description: Detects duplicate chat samples by comparing full message arrays.
tags: [decontamination, deduplication, gate2]
---
"#;

pub fn plugin() -> PluginRegistration {
    PluginRegistration::new(
        "gate2_deduplication_and_decontamination/deduplication_validator.rs",
        "DeduplicationValidator",
        MANIFEST,
        DeduplicationValidator::create,
    )
}

/// Flags every sample whose message array equals an earlier sample's.
pub struct DeduplicationValidator {
    context: ValidatorContext,
}

impl DeduplicationValidator {
    pub fn new(context: ValidatorContext) -> Self {
        Self { context }
    }

    fn create(context: ValidatorContext) -> Result<Box<dyn DatasetValidator>, ValidatorError> {
        Ok(Box::new(Self::new(context)))
    }
}

#[async_trait]
impl DatasetValidator for DeduplicationValidator {
    fn name(&self) -> &str {
        "DeduplicationValidator"
    }

    fn progress(&self) -> &ProgressReporter {
        &self.context.progress
    }

    async fn check(&self, dataset: &Dataset) -> Result<Vec<ValidationErrorDetail>, ValidatorError> {
        let total = dataset.len();
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(total);
        let mut errors = Vec::new();

        for (i, item) in dataset.iter().enumerate() {
            match serde_json::to_string(&item.messages) {
                Ok(key) => {
                    if let Some(&first) = seen.get(&key) {
                        errors.push(
                            ValidationErrorDetail::new(format!(
                                "Sample {} is a duplicate of sample {}.",
                                i, first
                            ))
                            .at_index(i)
                            .with_code("duplicate_sample"),
                        );
                    } else {
                        seen.insert(key, i);
                    }
                }
                Err(e) => errors.push(
                    ValidationErrorDetail::new(format!(
                        "Unable to serialize messages for comparison: {}",
                        e
                    ))
                    .at_index(i)
                    .with_code("serialization_error"),
                ),
            }
            self.context.progress.progress(i + 1, total);
        }

        Ok(errors)
    }
}
