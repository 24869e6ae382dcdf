//! Batch delegation to an endpoint chosen by the caller.

use checkr_core::{DatasetValidator, PluginRegistration, ValidatorContext, ValidatorError};

use crate::remote::{RemoteEnvironment, RemoteValidator};

pub const CLASS_NAME: &str = "ConfigurableRemoteValidator";

pub const MANIFEST: &str = r#"---
title: Configurable Remote Validator
stage: draft
description: Run validation using endpoint from config
tags: [remote, gate10]
options:
  endpoint: https://example.com/api/validate
---
"#;

pub fn plugin(environment: RemoteEnvironment) -> PluginRegistration {
    PluginRegistration::new(
        "gate10_external_services/configurable_remote_validator.rs",
        CLASS_NAME,
        MANIFEST,
        move |context: ValidatorContext| -> Result<Box<dyn DatasetValidator>, ValidatorError> {
            Ok(Box::new(RemoteValidator::new(
                CLASS_NAME,
                context,
                environment.clone(),
            )))
        },
    )
}
