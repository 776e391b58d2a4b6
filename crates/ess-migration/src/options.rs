//! Run options for a migration

use ess_values::ConflictPolicy;

/// Options shared by every component migrated in one run
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Ask the resolver for missing secrets and files before validating
    pub interactive: bool,

    /// How target writes treat scalars that block a path
    pub conflict_policy: ConflictPolicy,

    /// Root under which extra files are mounted (`<root>/<component>/extra`)
    pub mount_root: String,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            conflict_policy: ConflictPolicy::Strict,
            mount_root: "/etc".to_string(),
        }
    }
}

impl MigrationOptions {
    /// Create options with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable interactive remediation
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Set the conflict policy for target writes
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Set the mount root for extra files
    #[must_use]
    pub fn with_mount_root(mut self, root: impl Into<String>) -> Self {
        self.mount_root = root.into();
        self
    }

    /// Default mount directory for a component's extra files
    #[must_use]
    pub fn extra_mount_dir(&self, component_root_key: &str) -> String {
        format!(
            "{}/{component_root_key}/extra",
            self.mount_root.trim_end_matches('/')
        )
    }
}
