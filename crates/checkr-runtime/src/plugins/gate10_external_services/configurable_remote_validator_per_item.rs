//! Per-item delegation: one request per dataset item.

use checkr_core::{DatasetValidator, PluginRegistration, ValidatorContext, ValidatorError};

use crate::remote::{RemoteEnvironment, RemotePerItemValidator};

pub const CLASS_NAME: &str = "ConfigurableRemoteValidatorPerItem";

pub const MANIFEST: &str = r#"---
title: Configurable Remote Validator (per item)
stage: draft
description: Run validation item by item using endpoint from config
tags: [remote, gate10]
options:
  endpoint: https://example.com/api/validate
---
"#;

pub fn plugin(environment: RemoteEnvironment) -> PluginRegistration {
    PluginRegistration::new(
        "gate10_external_services/configurable_remote_validator_per_item.rs",
        CLASS_NAME,
        MANIFEST,
        move |context: ValidatorContext| -> Result<Box<dyn DatasetValidator>, ValidatorError> {
            Ok(Box::new(RemotePerItemValidator::new(
                CLASS_NAME,
                context,
                environment.clone(),
            )))
        },
    )
}
