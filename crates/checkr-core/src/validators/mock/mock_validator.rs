//! Always-passing validator for wiring tests. Tagged `mock`, so it never
//! appears in the public catalog.

use async_trait::async_trait;

use crate::dataset::Dataset;
use crate::registry::PluginRegistration;
use crate::report::ValidationErrorDetail;
use crate::validator::{DatasetValidator, ProgressReporter, ValidatorContext, ValidatorError};

pub const MANIFEST: &str = r#"---
title: Mock Validator
description: Pretends to validate data. Always succeeds.
stage: mock
tags: [mock]
---
"#;

pub fn plugin() -> PluginRegistration {
    PluginRegistration::new(
        "mock/mock_validator.rs",
        "MockValidator",
        MANIFEST,
        MockValidator::create,
    )
}

pub struct MockValidator {
    context: ValidatorContext,
}

impl MockValidator {
    pub fn new(context: ValidatorContext) -> Self {
        Self { context }
    }

    fn create(context: ValidatorContext) -> Result<Box<dyn DatasetValidator>, ValidatorError> {
        Ok(Box::new(Self::new(context)))
    }
}

#[async_trait]
impl DatasetValidator for MockValidator {
    fn name(&self) -> &str {
        "MockValidator"
    }

    fn progress(&self) -> &ProgressReporter {
        &self.context.progress
    }

    async fn check(&self, _dataset: &Dataset) -> Result<Vec<ValidationErrorDetail>, ValidatorError> {
        Ok(Vec::new())
    }
}
