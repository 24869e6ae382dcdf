use async_trait::async_trait;
use checkr_core::{
    Dataset, DatasetValidator, ProgressReporter, ValidationErrorDetail, ValidatorContext,
    ValidatorError,
};
use serde_json::{json, Value as JsonValue};

use super::{
    decode_error_entry, error_body, items_payload, EndpointSpec, RemoteEnvironment, RemoteReply,
    REMOTE_ERROR, REMOTE_ERROR_PARSE, REMOTE_HTTP_ERROR,
};

/// Ships the whole dataset in one POST and relays the remote findings.
#[derive(Debug)]
pub struct RemoteValidator {
    name: String,
    endpoint: EndpointSpec,
    context: ValidatorContext,
    environment: RemoteEnvironment,
}

impl RemoteValidator {
    /// A client whose endpoint comes from `options.endpoint`.
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

    /// Pin the endpoint, ignoring `options.endpoint`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint.fixed = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl DatasetValidator for RemoteValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> &ProgressReporter {
        &self.context.progress
    }

    async fn check(&self, dataset: &Dataset) -> Result<Vec<ValidationErrorDetail>, ValidatorError> {
        let url = self.endpoint.resolve(&self.name, &self.context, &self.environment)?;
        let payload = json!({
            "dataset": items_payload(dataset)?,
            "options": self.context.options,
        });

        self.context.progress.stage("sending to remote");
        tracing::debug!(validator = %self.name, url = %url, items = dataset.len(), "Delegating dataset");

        let response = match self.environment.transport.post_json(&url, &payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(validator = %self.name, url = %url, error = %e, "Remote request failed");
                return Ok(vec![ValidationErrorDetail::new(format!(
                    "Remote request to {} failed: {}",
                    url, e
                ))
                .with_code(REMOTE_HTTP_ERROR)]);
            }
        };

        if !response.is_success() {
            return Ok(vec![ValidationErrorDetail::new(format!(
                "Remote HTTP error {}: {}",
                response.status,
                error_body(&response)
            ))
            .with_code(REMOTE_HTTP_ERROR)]);
        }

        let reply: RemoteReply = match response.json() {
            Ok(reply) => reply,
            Err(e) => {
                return Ok(vec![ValidationErrorDetail::new(format!(
                    "Remote reply is not valid JSON: {} ({})",
                    response.body, e
                ))
                .with_code(REMOTE_ERROR_PARSE)])
            }
        };

        self.context.progress.stage("processing response");

        if !reply.is_failed() {
            return Ok(Vec::new());
        }

        Ok(reply
            .errors
            .iter()
            .map(|entry: &JsonValue| decode_error_entry(entry, None, REMOTE_ERROR))
            .collect())
    }
}
