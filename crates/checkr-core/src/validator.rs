//! The validator contract.
//!
//! Every validator, in-process or remote proxy, implements [`DatasetValidator`].
//! Implementations only provide [`DatasetValidator::check`]; the provided
//! [`DatasetValidator::validate`] wraps it with dataset coercion, status
//! derivation and the error backstop.
//!
//! # Contract
//! - A payload that does not coerce into a [`Dataset`] fails the whole call
//!   with one `parse_error` detail per offending item
//! - `status` is `passed` iff `check` returned no findings
//! - `validate` never propagates an error or a panic: both become a `failed`
//!   result carrying the message
//! - Progress reporting is fire-and-forget; a failing sink never changes the outcome

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::dataset::Dataset;
use crate::report::{ValidationErrorDetail, ValidationResult};
use crate::Options;

/// Errors raised inside a validator.
///
/// These never leave [`DatasetValidator::validate`]; they are folded into a
/// `failed` result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("No '{option}' provided in options for {validator}.")]
    MissingOption {
        validator: String,
        option: &'static str,
    },

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Failed to construct validator: {0}")]
    Construction(String),

    #[error("{0}")]
    Execution(String),

    #[error("Validator panicked: {0}")]
    Panicked(String),
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    /// A named phase, e.g. `starting` or `sending to remote`
    Stage { validator: String, stage: String },

    /// Item counters
    Counter {
        validator: String,
        current: usize,
        total: usize,
    },
}

/// A progress sink could not accept an event.
#[derive(Error, Debug, Clone)]
#[error("Progress sink failed: {0}")]
pub struct ProgressError(pub String);

/// Receiver of progress notifications.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent) -> Result<(), ProgressError>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) -> Result<(), ProgressError> + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) -> Result<(), ProgressError> {
        self(event)
    }
}

/// Advisory progress reporter handed to each validator instance.
///
/// Sink failures and panics are swallowed and logged at debug level.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    validator: String,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressReporter {
    /// Reporter forwarding to `sink`.
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            validator: String::new(),
            sink: Some(sink),
        }
    }

    /// Reporter that drops every event.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Bind the reporter to a validator name.
    pub fn named(mut self, validator: impl Into<String>) -> Self {
        self.validator = validator.into();
        self
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    /// Report a named stage.
    pub fn stage(&self, stage: impl Into<String>) {
        self.emit(ProgressEvent::Stage {
            validator: self.validator.clone(),
            stage: stage.into(),
        });
    }

    /// Report item counters.
    pub fn progress(&self, current: usize, total: usize) {
        self.emit(ProgressEvent::Counter {
            validator: self.validator.clone(),
            current,
            total,
        });
    }

    fn emit(&self, event: ProgressEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| sink.report(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(validator = %self.validator, error = %e, "Progress report failed");
            }
            Err(payload) => {
                tracing::debug!(
                    validator = %self.validator,
                    panic = %panic_message(payload.as_ref()),
                    "Progress sink panicked"
                );
            }
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("validator", &self.validator)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Construction-time inputs for a validator instance.
#[derive(Debug, Clone, Default)]
pub struct ValidatorContext {
    /// Caller options merged over the declared defaults
    pub options: Options,

    pub progress: ProgressReporter,
}

impl ValidatorContext {
    pub fn new(options: Options, progress: ProgressReporter) -> Self {
        Self { options, progress }
    }

    /// Read a string option.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(JsonValue::as_str)
    }
}

/// The capability every validator implements.
#[async_trait]
pub trait DatasetValidator: Send + Sync {
    /// Validator name reported in results (the plugin class name).
    fn name(&self) -> &str;

    /// Progress reporter supplied at construction.
    fn progress(&self) -> &ProgressReporter;

    /// Per-type validation routine. Returns the findings; an empty list passes.
    async fn check(&self, dataset: &Dataset) -> Result<Vec<ValidationErrorDetail>, ValidatorError>;

    /// Validate a raw JSON payload.
    ///
    /// Coerces the payload into a [`Dataset`] first; any non-conforming item
    /// fails the call without running [`check`](Self::check).
    async fn validate(&self, raw: &JsonValue) -> ValidationResult {
        match Dataset::from_json(raw) {
            Ok(dataset) => self.validate_dataset(&dataset).await,
            Err(errors) => ValidationResult::from_errors(self.name(), errors),
        }
    }

    /// Validate an already-normalized dataset.
    async fn validate_dataset(&self, dataset: &Dataset) -> ValidationResult {
        let started = Instant::now();
        self.progress().stage("starting");

        let outcome = AssertUnwindSafe(self.check(dataset)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(errors)) => {
                self.progress()
                    .stage(format!("complete ({:.2}s)", started.elapsed().as_secs_f64()));
                ValidationResult::from_errors(self.name(), errors)
            }
            Ok(Err(e)) => {
                tracing::warn!(validator = %self.name(), error = %e, "Validator failed");
                ValidationResult::failure(self.name(), e.to_string())
            }
            Err(payload) => {
                let e = ValidatorError::Panicked(panic_message(payload.as_ref()));
                tracing::error!(validator = %self.name(), error = %e, "Validator panicked");
                ValidationResult::failure(self.name(), e.to_string())
            }
        };

        tracing::debug!(
            validator = %self.name(),
            status = ?result.status,
            errors = result.errors.len(),
            "Validator finished"
        );
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ValidationStatus;
    use serde_json::json;
    use std::sync::Mutex;

    enum Behaviour {
        Pass,
        Findings,
        Fail,
        Panic,
    }

    struct Scripted {
        behaviour: Behaviour,
        progress: ProgressReporter,
    }

    impl Scripted {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                progress: ProgressReporter::silent().named("Scripted"),
            }
        }
    }

    #[async_trait]
    impl DatasetValidator for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn progress(&self) -> &ProgressReporter {
            &self.progress
        }

        async fn check(
            &self,
            dataset: &Dataset,
        ) -> Result<Vec<ValidationErrorDetail>, ValidatorError> {
            match self.behaviour {
                Behaviour::Pass => Ok(vec![]),
                Behaviour::Findings => Ok(vec![
                    ValidationErrorDetail::new(format!("{} items", dataset.len())).at_index(0)
                ]),
                Behaviour::Fail => Err(ValidatorError::Execution("exploded".into())),
                Behaviour::Panic => panic!("kaboom"),
            }
        }
    }

    fn sample() -> JsonValue {
        json!([{"messages": [{"role": "user", "content": "Hello!"}]}])
    }

    #[tokio::test]
    async fn test_empty_findings_pass() {
        let result = Scripted::new(Behaviour::Pass).validate(&sample()).await;
        assert_eq!(result.status, ValidationStatus::Passed);
        assert_eq!(result.validator, "Scripted");
    }

    #[tokio::test]
    async fn test_findings_fail() {
        let result = Scripted::new(Behaviour::Findings).validate(&sample()).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.errors[0].error, "1 items");
    }

    #[tokio::test]
    async fn test_malformed_payload_never_reaches_check() {
        let result = Scripted::new(Behaviour::Panic)
            .validate(&json!([{"messages": [{"role": "user"}]}]))
            .await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.errors[0].code.as_deref(), Some("parse_error"));
    }

    #[tokio::test]
    async fn test_error_becomes_failed_result() {
        let result = Scripted::new(Behaviour::Fail).validate(&sample()).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.errors[0].error, "exploded");
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let result = Scripted::new(Behaviour::Panic).validate(&sample()).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.errors[0].error.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_progress_events_are_delivered() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let sink = move |event: &ProgressEvent| -> Result<(), ProgressError> {
            recorded.lock().unwrap().push(event.clone());
            Ok(())
        };

        let validator = Scripted {
            behaviour: Behaviour::Pass,
            progress: ProgressReporter::new(Arc::new(sink)).named("Scripted"),
        };
        validator.validate(&sample()).await;

        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            ProgressEvent::Stage {
                validator: "Scripted".into(),
                stage: "starting".into()
            }
        );
        assert!(matches!(&events[1], ProgressEvent::Stage { stage, .. } if stage.starts_with("complete")));
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_change_outcome() {
        let failing = |_: &ProgressEvent| -> Result<(), ProgressError> {
            Err(ProgressError("closed".into()))
        };
        let panicking = |_: &ProgressEvent| -> Result<(), ProgressError> { panic!("sink down") };

        for sink in [
            Arc::new(failing) as Arc<dyn ProgressSink>,
            Arc::new(panicking) as Arc<dyn ProgressSink>,
        ] {
            let validator = Scripted {
                behaviour: Behaviour::Pass,
                progress: ProgressReporter::new(sink).named("Scripted"),
            };
            assert!(validator.validate(&sample()).await.is_passed());
        }
    }

    #[test]
    fn test_progress_event_wire_shape() {
        let stage = ProgressEvent::Stage {
            validator: "V".into(),
            stage: "starting".into(),
        };
        assert_eq!(
            serde_json::to_value(&stage).unwrap(),
            json!({"validator": "V", "stage": "starting"})
        );

        let counter = ProgressEvent::Counter {
            validator: "V".into(),
            current: 1,
            total: 2,
        };
        assert_eq!(
            serde_json::to_value(&counter).unwrap(),
            json!({"validator": "V", "current": 1, "total": 2})
        );
    }
}
