//! Built-in in-process validators.
//!
//! Each plugin module exposes a `plugin()` registration. Adding a validator
//! means adding its module here and listing it in [`builtin_plugins`].

pub mod gate2_deduplication_and_decontamination;
pub mod mock;

use crate::registry::PluginRegistration;

/// The compiled-in plugin table of this crate.
pub fn builtin_plugins() -> Vec<PluginRegistration> {
    vec![
        gate2_deduplication_and_decontamination::deduplication_validator::plugin(),
        mock::mock_validator::plugin(),
    ]
}
