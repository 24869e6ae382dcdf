use async_trait::async_trait;
use checkr_core::{
    Dataset, DatasetValidator, ProgressReporter, ValidationErrorDetail, ValidatorContext,
    ValidatorError,
};
use serde_json::json;

use super::{
    decode_error_entry, error_body, items_payload, EndpointSpec, RemoteEnvironment, RemoteReply,
    REMOTE_ERROR_PARSE, REMOTE_HTTP_ERROR, REMOTE_ITEM_ERROR,
};

/// Ships one dataset item per POST, reporting progress as it goes.
///
/// A failing item never stops the run: its error is recorded at its index
/// and the next item is sent.
#[derive(Debug)]
pub struct RemotePerItemValidator {
    name: String,
    endpoint: EndpointSpec,
    context: ValidatorContext,
    environment: RemoteEnvironment,
}

impl RemotePerItemValidator {
    pub fn new(
        name: impl Into<String>,
        context: ValidatorContext,
        environment: RemoteEnvironment,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: EndpointSpec { fixed: None },
            context,
            environment,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint.fixed = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl DatasetValidator for RemotePerItemValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> &ProgressReporter {
        &self.context.progress
    }

    async fn check(&self, dataset: &Dataset) -> Result<Vec<ValidationErrorDetail>, ValidatorError> {
        let url = self.endpoint.resolve(&self.name, &self.context, &self.environment)?;
        let items = items_payload(dataset)?;
        let total = items.len();
        let mut errors = Vec::new();

        self.context
            .progress
            .stage(format!("validating {} items remotely", total));

        for (index, item) in items.into_iter().enumerate() {
            self.context.progress.progress(index + 1, total);

            let payload = json!({
                "dataset": [item],
                "index": index,
                "options": self.context.options,
            });

            let response = match self.environment.transport.post_json(&url, &payload).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(validator = %self.name, index, error = %e, "Remote item request failed");
                    errors.push(
                        ValidationErrorDetail::new(format!("Request to {} failed: {}", url, e))
                            .at_index(index)
                            .with_code(REMOTE_HTTP_ERROR),
                    );
                    continue;
                }
            };

            if !response.is_success() {
                errors.push(
                    ValidationErrorDetail::new(format!(
                        "HTTP {}: {}",
                        response.status,
                        error_body(&response)
                    ))
                    .at_index(index)
                    .with_code(REMOTE_HTTP_ERROR),
                );
                continue;
            }

            match response.json::<RemoteReply>() {
                Ok(reply) if reply.is_failed() => errors.extend(
                    reply
                        .errors
                        .iter()
                        .map(|entry| decode_error_entry(entry, Some(index), REMOTE_ITEM_ERROR)),
                ),
                Ok(_) => {}
                Err(e) => errors.push(
                    ValidationErrorDetail::new(format!(
                        "Remote reply is not valid JSON: {} ({})",
                        response.body, e
                    ))
                    .at_index(index)
                    .with_code(REMOTE_ERROR_PARSE),
                ),
            }
        }

        Ok(errors)
    }
}
