//! Backend validator registry.
//!
//! Plugins are registered explicitly through a [`PluginRegistration`] table
//! compiled into the binary: each entry names its source path, its class
//! name, its frontmatter manifest and a factory. The registry is built once at
//! startup and held for the process lifetime; there is no hot-reload.
//!
//! Plugins run in-process with the same trust level as the host.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::descriptor::{SkippedEntry, ValidatorDescriptor, ValidatorKind};
use crate::frontmatter::{self, Frontmatter};
use crate::validator::{DatasetValidator, ProgressReporter, ValidatorContext, ValidatorError};
use crate::{merge_options, Options};

/// Prefix of every backend gate identifier.
pub const BACKEND_SOURCE_PREFIX: &str = "backend";

/// Builds a fresh validator instance from its context.
///
/// Factories may capture shared services (an HTTP transport, a base URL)
/// so that plugins receive their environment by injection.
pub type ValidatorFactory = Arc<
    dyn Fn(ValidatorContext) -> Result<Box<dyn DatasetValidator>, ValidatorError> + Send + Sync,
>;

/// A compiled-in plugin.
#[derive(Clone)]
pub struct PluginRegistration {
    /// Path relative to the plugin tree, e.g. `gate2/dedup.rs`
    pub path: &'static str,

    /// Exported class name, used for result naming and proxy synthesis
    pub class_name: &'static str,

    /// Source text whose leading frontmatter declares the metadata
    pub manifest: &'static str,

    pub factory: ValidatorFactory,
}

impl PluginRegistration {
    pub fn new<F>(
        path: &'static str,
        class_name: &'static str,
        manifest: &'static str,
        factory: F,
    ) -> Self
    where
        F: Fn(ValidatorContext) -> Result<Box<dyn DatasetValidator>, ValidatorError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            path,
            class_name,
            manifest,
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("path", &self.path)
            .field("class_name", &self.class_name)
            .finish()
    }
}

/// A discovered, invokable backend validator.
#[derive(Clone)]
pub struct RegisteredValidator {
    pub descriptor: ValidatorDescriptor,

    /// Path relative to the plugin tree
    pub path: String,

    pub class_name: String,

    /// Raw frontmatter, kept for re-emission in proxy stubs
    pub frontmatter: Frontmatter,

    factory: ValidatorFactory,
}

impl RegisteredValidator {
    /// Construct a fresh instance with caller options merged over the
    /// declared defaults.
    pub fn instantiate(
        &self,
        options: &Options,
        progress: ProgressReporter,
    ) -> Result<Box<dyn DatasetValidator>, ValidatorError> {
        let context = ValidatorContext::new(
            merge_options(&self.descriptor.options, options),
            progress.named(self.class_name.clone()),
        );
        (self.factory)(context)
    }
}

impl fmt::Debug for RegisteredValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredValidator")
            .field("source", &self.descriptor.source)
            .field("class_name", &self.class_name)
            .finish()
    }
}

/// Registry of in-process validators keyed by `source`.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    /// Registration order is preserved for listing
    entries: Vec<Arc<RegisteredValidator>>,
    by_source: HashMap<String, usize>,
    skipped: Vec<SkippedEntry>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a plugin table.
    ///
    /// Entries declaring `type: base`, declaring an unknown type, or
    /// duplicating an earlier path are skipped with a warning and recorded in
    /// [`skipped`](Self::skipped). Discovery never aborts on one bad entry.
    pub fn discover(plugins: impl IntoIterator<Item = PluginRegistration>) -> Self {
        let mut registry = Self::new();
        for plugin in plugins {
            registry.register(plugin);
        }
        tracing::info!(
            registered = registry.entries.len(),
            skipped = registry.skipped.len(),
            "Backend validator discovery complete"
        );
        registry
    }

    /// Register one plugin. Returns `false` if it was skipped.
    pub fn register(&mut self, plugin: PluginRegistration) -> bool {
        let front = frontmatter::extract(plugin.manifest);
        let source = format!("{}/{}", BACKEND_SOURCE_PREFIX, plugin.path);
        let stem = Path::new(plugin.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(plugin.path);

        let declared = match ValidatorDescriptor::from_frontmatter(
            &front,
            source.clone(),
            ValidatorKind::DatasetBackend,
            stem,
        ) {
            Ok(descriptor) => descriptor,
            Err(e) => return self.skip(plugin.path, e.to_string()),
        };

        if declared.is_base() {
            return self.skip(plugin.path, "declares type: base");
        }

        if self.by_source.contains_key(&source) {
            return self.skip(plugin.path, "duplicate plugin path");
        }

        let descriptor = ValidatorDescriptor {
            kind: ValidatorKind::DatasetBackend,
            ..declared
        };

        tracing::debug!(source = %source, class = plugin.class_name, "Discovered validator");
        self.by_source.insert(source, self.entries.len());
        self.entries.push(Arc::new(RegisteredValidator {
            descriptor,
            path: plugin.path.to_string(),
            class_name: plugin.class_name.to_string(),
            frontmatter: front,
            factory: plugin.factory,
        }));
        true
    }

    fn skip(&mut self, path: &str, reason: impl Into<String>) -> bool {
        let entry = SkippedEntry::new(path, reason);
        tracing::warn!(path = %entry.path, reason = %entry.reason, "Skipping backend plugin");
        self.skipped.push(entry);
        false
    }

    /// Look up a registered validator by source.
    pub fn get(&self, source: &str) -> Option<&Arc<RegisteredValidator>> {
        self.by_source.get(source).map(|&i| &self.entries[i])
    }

    /// Look up a registered validator by its path relative to the plugin tree.
    pub fn get_by_path(&self, path: &str) -> Option<&Arc<RegisteredValidator>> {
        self.get(&format!("{}/{}", BACKEND_SOURCE_PREFIX, path))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.by_source.contains_key(source)
    }

    /// Sources that are not registered, in input order.
    pub fn unknown<'a>(&self, sources: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        sources
            .into_iter()
            .filter(|s| !self.contains(s))
            .map(str::to_string)
            .collect()
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ValidatorDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Descriptors visible to catalog callers (mock-tagged entries hidden).
    pub fn public_descriptors(&self) -> Vec<ValidatorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.is_public())
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Construct a fresh instance of a registered validator.
    pub fn instantiate(
        &self,
        source: &str,
        options: &Options,
        progress: ProgressReporter,
    ) -> Result<Box<dyn DatasetValidator>, ValidatorError> {
        self.get(source)
            .ok_or_else(|| ValidatorError::Construction(format!("Unknown gate: {}", source)))?
            .instantiate(options, progress)
    }

    /// Entries skipped during discovery.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
