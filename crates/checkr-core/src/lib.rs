//! # checkr-core
//!
//! Catalog model and validator contract for Checkr dataset gates.
//!
//! A *gate* is a validator identified by its unique `source` string. This
//! crate provides everything that does not touch the network:
//!
//! - The data model: [`ValidatorDescriptor`], [`Dataset`], [`ValidationErrorDetail`],
//!   [`ValidationResult`] and the merged [`AggregateResult`]
//! - The [`frontmatter`] extractor that turns a document's leading `---` block
//!   into a metadata mapping (and back)
//! - The [`DatasetValidator`] contract every plugin implements
//! - The [`BackendRegistry`], a compiled-in plugin table built once at startup
//! - Built-in in-process validators (deduplication, mock)
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkr_core::{validators, BackendRegistry, Options};
//!
//! let registry = BackendRegistry::discover(validators::builtin_plugins());
//! let validator = registry.instantiate(
//!     "backend/gate2_deduplication_and_decontamination/deduplication_validator.rs",
//!     &Options::new(),
//!     Default::default(),
//! )?;
//!
//! let result = validator.validate(&serde_json::json!([
//!     {"messages": [{"role": "user", "content": "Hello!"}]}
//! ])).await;
//! assert!(result.is_passed());
//! ```

pub mod dataset;
pub mod descriptor;
pub mod frontmatter;
pub mod registry;
pub mod report;
pub mod validator;
pub mod validators;

pub use dataset::{DataItem, Dataset, Message, RawDataItem, Role};
pub use descriptor::{
    DescriptorError, SkippedEntry, ValidatorDescriptor, ValidatorKind, MOCK_TAG,
};
pub use frontmatter::Frontmatter;
pub use registry::{
    BackendRegistry, PluginRegistration, RegisteredValidator, ValidatorFactory,
    BACKEND_SOURCE_PREFIX,
};
pub use report::{
    AggregateResult, AggregateStatus, ValidationErrorDetail, ValidationResult, ValidationStatus,
};
pub use validator::{
    DatasetValidator, ProgressError, ProgressEvent, ProgressReporter, ProgressSink,
    ValidatorContext, ValidatorError,
};

/// Validator configuration: caller-supplied options merged over declared defaults.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Shallow-merge `overrides` on top of `defaults`.
///
/// Keys present in `overrides` replace the default value wholesale; nested
/// objects are not merged.
pub fn merge_options(defaults: &Options, overrides: &Options) -> Options {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
