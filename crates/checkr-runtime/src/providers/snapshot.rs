//! In-memory listing shared by the repository-backed providers.

use checkr_core::frontmatter;
use checkr_core::{SkippedEntry, ValidatorDescriptor, ValidatorKind};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::strip_prefix;

/// Everything a repository walk produced: descriptors, raw sources and skips.
///
/// Built once per provider instance and then only read.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    prefix: String,
    root: String,
    validators: Vec<ValidatorDescriptor>,
    base: Vec<ValidatorDescriptor>,
    contents: HashMap<String, String>,
    skipped: Vec<SkippedEntry>,
}

impl Snapshot {
    /// An empty snapshot for provider `prefix` rooted at `root`.
    pub fn new(prefix: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into().trim_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Record a fetched file and classify it.
    ///
    /// Files lacking `title` or `description` are kept as raw content but are
    /// not validator definitions.
    pub fn admit(&mut self, path: &str, content: String) {
        let front = frontmatter::extract(&content);
        self.contents.insert(path.to_string(), content);

        if !frontmatter::declares_title_and_description(&front) {
            tracing::debug!(path = %path, "No title/description, not a validator definition");
            return;
        }

        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path);
        let source = format!("{}/{}", self.prefix, path);

        match ValidatorDescriptor::from_frontmatter(&front, source, ValidatorKind::DatasetFrontend, stem) {
            Ok(descriptor) if descriptor.is_base() => self.base.push(descriptor),
            Ok(descriptor) => self.validators.push(descriptor),
            Err(e) => self.skip(path, e.to_string()),
        }
    }

    /// Record an entry that could not be admitted.
    pub fn skip(&mut self, path: &str, reason: impl Into<String>) {
        let entry = SkippedEntry::new(path, reason);
        tracing::warn!(provider = %self.prefix, path = %entry.path, reason = %entry.reason, "Skipping file");
        self.skipped.push(entry);
    }

    /// Non-base descriptors in walk order.
    pub fn validators(&self) -> &[ValidatorDescriptor] {
        &self.validators
    }

    pub fn base(&self) -> &[ValidatorDescriptor] {
        &self.base
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Raw text for a source identifier or bare path; empty if unknown.
    pub fn source(&self, source: &str) -> String {
        self.contents
            .get(strip_prefix(source, &self.prefix))
            .cloned()
            .unwrap_or_default()
    }

    /// Base sources keyed relative to the parent of the root path.
    pub fn base_sources(&self) -> BTreeMap<String, String> {
        self.base
            .iter()
            .map(|d| {
                let path = strip_prefix(&d.source, &self.prefix);
                (self.base_key(path), self.contents.get(path).cloned().unwrap_or_default())
            })
            .collect()
    }

    fn base_key(&self, path: &str) -> String {
        let parent = Path::new(&self.root)
            .parent()
            .and_then(|p| p.to_str())
            .unwrap_or("");
        if parent.is_empty() {
            return path.to_string();
        }
        path.strip_prefix(parent)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "\"\"\"\n---\ntitle: Base Validator\ntype: base\ndescription: Shared logic\n---\n\"\"\"\nclass BaseValidator: pass\n";
    const PUBLIC: &str = "\"\"\"\n---\ntitle: Length\ndescription: Checks length\ntags: gate1\n---\n\"\"\"\n";

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new("gitlab", "frontend/validators");
        snapshot.admit("frontend/validators/base_validator.py", BASE.to_string());
        snapshot.admit("frontend/validators/gate1/length.py", PUBLIC.to_string());
        snapshot.admit("frontend/validators/helpers.py", "def helper(): pass\n".to_string());
        snapshot
    }

    #[test]
    fn test_classifies_base_and_public() {
        let snapshot = snapshot();
        assert_eq!(snapshot.validators().len(), 1);
        assert_eq!(snapshot.base().len(), 1);

        let public = &snapshot.validators()[0];
        assert_eq!(public.source, "gitlab/frontend/validators/gate1/length.py");
        assert_eq!(public.kind, ValidatorKind::DatasetFrontend);
        assert_eq!(public.tags, vec!["gate1"]);
    }

    #[test]
    fn test_source_lookup_with_and_without_prefix() {
        let snapshot = snapshot();
        assert_eq!(snapshot.source("gitlab/frontend/validators/gate1/length.py"), PUBLIC);
        assert_eq!(snapshot.source("frontend/validators/gate1/length.py"), PUBLIC);
        assert_eq!(snapshot.source("gitlab/frontend/validators/absent.py"), "");
    }

    #[test]
    fn test_base_sources_are_keyed_from_root_parent() {
        let sources = snapshot().base_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources["validators/base_validator.py"], BASE);
    }

    #[test]
    fn test_base_key_with_single_segment_root() {
        let mut snapshot = Snapshot::new("github", "validators");
        snapshot.admit("validators/base.py", BASE.to_string());
        assert!(snapshot.base_sources().contains_key("validators/base.py"));
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let mut snapshot = Snapshot::new("github", "");
        snapshot.admit(
            "odd.py",
            "---\ntitle: Odd\ndescription: x\ntype: spreadsheet\n---\n".to_string(),
        );
        assert!(snapshot.validators().is_empty());
        assert_eq!(snapshot.skipped()[0].path, "odd.py");
    }
}
