//! Backend plugins that need runtime services.
//!
//! These plugins delegate to remote endpoints, so their factories capture a
//! [`RemoteEnvironment`]. [`builtin_plugins`] returns the complete plugin
//! table of the process: the in-process validators of `checkr-core` plus the
//! ones defined here.

pub mod gate10_external_services;

use checkr_core::{validators, PluginRegistration};

use crate::remote::RemoteEnvironment;

/// Every compiled-in plugin, with delegation clients bound to `environment`.
pub fn builtin_plugins(environment: &RemoteEnvironment) -> Vec<PluginRegistration> {
    let mut plugins = validators::builtin_plugins();
    plugins.push(gate10_external_services::configurable_remote_validator::plugin(
        environment.clone(),
    ));
    plugins.push(
        gate10_external_services::configurable_remote_validator_per_item::plugin(
            environment.clone(),
        ),
    );
    plugins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClient, HttpConfig};
    use checkr_core::BackendRegistry;
    use std::sync::Arc;

    #[test]
    fn test_builtin_table_registers_cleanly() {
        let environment =
            RemoteEnvironment::new(Arc::new(HttpClient::new(HttpConfig::default()).unwrap()));
        let registry = BackendRegistry::discover(builtin_plugins(&environment));

        assert_eq!(registry.len(), 4);
        assert!(registry.skipped().is_empty());
        assert!(registry.contains(
            "backend/gate10_external_services/configurable_remote_validator.rs"
        ));
        assert!(registry.contains(
            "backend/gate10_external_services/configurable_remote_validator_per_item.rs"
        ));
        assert_eq!(registry.public_descriptors().len(), 3);
    }
}
