//! Gate 2: deduplication and decontamination.

pub mod deduplication_validator;
