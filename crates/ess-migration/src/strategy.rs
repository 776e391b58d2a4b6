//! Per-component migration strategies
//!
//! A component describes itself through three narrow traits. Every
//! component has a [`MigrationStrategy`]; secret and extra-file discovery
//! are opt-in, so a component implements only what applies to it.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::secrets::SecretSchemaEntry;
use crate::transformer::TransformationSpec;

/// Dotted paths the target platform manages unconditionally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideConfigSet(BTreeSet<String>);

impl OverrideConfigSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a path is platform-managed
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    /// Paths in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OverrideConfigSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Mapping rules for one component
pub trait MigrationStrategy: Send + Sync {
    /// Top-level key of the component in the target document
    fn component_root_key(&self) -> &str;

    /// Source paths the platform manages and users must not set
    fn override_configs(&self) -> OverrideConfigSet;

    /// Mapping rules, in declaration order
    fn transformations(&self) -> Vec<TransformationSpec>;
}

/// Where a component's credentials live in its source document
pub trait SecretDiscoveryStrategy: Send + Sync {
    /// Human-readable component name
    fn component_name(&self) -> &str;

    /// Secret schema, keyed by target secret key
    fn secret_schema(&self) -> Vec<SecretSchemaEntry>;

    /// Config keys of every file-reference path in the schema
    fn file_reference_keys(&self) -> Vec<String> {
        self.secret_schema()
            .into_iter()
            .filter_map(|entry| entry.file_reference_source_path)
            .collect()
    }
}

/// Which file references of a component are not imported
pub trait ExtraFilesStrategy: Send + Sync {
    /// Human-readable component name
    fn component_name(&self) -> &str;

    /// Config keys whose paths are runtime locations, not static content
    ///
    /// A key also covers the items nested under it.
    fn ignored_config_keys(&self) -> Vec<String>;

    /// Mount directory for imported files, when not the default
    fn mount_path(&self) -> Option<String> {
        None
    }
}

/// One migratable component and its optional discovery capabilities
#[derive(Clone)]
pub struct Component {
    /// Mapping rules
    pub migration: Arc<dyn MigrationStrategy>,

    /// Secret discovery, if the component carries credentials
    pub secrets: Option<Arc<dyn SecretDiscoveryStrategy>>,

    /// Extra-file discovery, if the component references files
    pub extra_files: Option<Arc<dyn ExtraFilesStrategy>>,
}

impl Component {
    /// Create a component with mapping rules only
    pub fn new(migration: impl MigrationStrategy + 'static) -> Self {
        Self {
            migration: Arc::new(migration),
            secrets: None,
            extra_files: None,
        }
    }

    /// Add secret discovery
    #[must_use]
    pub fn with_secrets(mut self, strategy: impl SecretDiscoveryStrategy + 'static) -> Self {
        self.secrets = Some(Arc::new(strategy));
        self
    }

    /// Add extra-file discovery
    #[must_use]
    pub fn with_extra_files(mut self, strategy: impl ExtraFilesStrategy + 'static) -> Self {
        self.extra_files = Some(Arc::new(strategy));
        self
    }

    /// Top-level key of the component
    #[must_use]
    pub fn root_key(&self) -> &str {
        self.migration.component_root_key()
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("root_key", &self.root_key())
            .field("secrets", &self.secrets.as_ref().map(|s| s.component_name().to_string()))
            .field(
                "extra_files",
                &self.extra_files.as_ref().map(|s| s.component_name().to_string()),
            )
            .finish()
    }
}
