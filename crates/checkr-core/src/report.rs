//! Validation findings and per-validator / aggregate results.

use serde::{Deserialize, Serialize};

/// A single finding produced by a validator.
///
/// `index = None` denotes a dataset-wide finding rather than one tied to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Human-readable message
    pub error: String,

    /// Index of the offending item, if any
    #[serde(default)]
    pub index: Option<usize>,

    /// Field that caused the error, if known
    #[serde(default)]
    pub field: Option<String>,

    /// Machine-readable error code
    #[serde(default)]
    pub code: Option<String>,
}

impl ValidationErrorDetail {
    /// Create a dataset-wide detail with only a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            index: None,
            field: None,
            code: None,
        }
    }

    /// Attach the offending item index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attach the offending field name.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Outcome of one validator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

/// Result of invoking a single validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,

    #[serde(default)]
    pub errors: Vec<ValidationErrorDetail>,

    /// Name of the validator that produced the result
    pub validator: String,
}

impl ValidationResult {
    /// Build a result from a list of findings: passed iff the list is empty.
    pub fn from_errors(validator: impl Into<String>, errors: Vec<ValidationErrorDetail>) -> Self {
        let status = if errors.is_empty() {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        };
        Self {
            status,
            errors,
            validator: validator.into(),
        }
    }

    /// A passing result.
    pub fn passed(validator: impl Into<String>) -> Self {
        Self::from_errors(validator, Vec::new())
    }

    /// A failing result carrying a single message.
    pub fn failure(validator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            errors: vec![ValidationErrorDetail::new(message)],
            validator: validator.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == ValidationStatus::Passed
    }
}

/// Overall outcome of a multi-gate validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Ok,
    Failed,
}

/// Merged result across every requested gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub status: AggregateStatus,

    /// Gates echoed in request order
    pub validated_gates: Vec<String>,

    pub errors: Vec<ValidationErrorDetail>,
}

impl AggregateResult {
    /// Merge per-gate results. Only failed results contribute errors.
    pub fn merge<'a>(
        gates: Vec<String>,
        results: impl IntoIterator<Item = &'a ValidationResult>,
    ) -> Self {
        let errors: Vec<ValidationErrorDetail> = results
            .into_iter()
            .filter(|r| r.status == ValidationStatus::Failed)
            .flat_map(|r| r.errors.iter().cloned())
            .collect();

        let status = if errors.is_empty() {
            AggregateStatus::Ok
        } else {
            AggregateStatus::Failed
        };

        Self {
            status,
            validated_gates: gates,
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AggregateStatus::Ok
    }
}
