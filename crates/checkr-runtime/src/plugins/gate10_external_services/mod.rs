pub mod configurable_remote_validator;
pub mod configurable_remote_validator_per_item;
