//! Remediation of unresolved discovery items
//!
//! Discovery never prompts. It returns missing secrets and files as data,
//! and a resolver decides what to do with each of them. Headless runs use
//! [`HeadlessResolver`] so validation reports everything still missing.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::MigrationResult;
use crate::extra_files::DiscoveredPath;
use crate::secrets::MissingSecret;

/// What to do about a referenced file that was not found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResolution {
    /// Import this file instead
    Alternative(PathBuf),
    /// Do not import anything for this reference
    Skip,
    /// Look for an entry with the same name in this directory
    SearchDirectory(PathBuf),
}

/// Supplies values for required secrets that were not discovered
pub trait SecretResolver {
    /// Return a value for `missing`, or `None` to leave it missing
    ///
    /// # Errors
    /// [`MigrationError::Cancelled`](crate::MigrationError::Cancelled) when
    /// the operator aborts.
    fn resolve_secret(
        &mut self,
        component: &str,
        missing: &MissingSecret,
    ) -> MigrationResult<Option<String>>;
}

/// Decides what to do about referenced files that were not found
pub trait ExtraFileResolver {
    /// Return a resolution for `missing`, or `None` to leave it missing
    ///
    /// # Errors
    /// [`MigrationError::Cancelled`](crate::MigrationError::Cancelled) when
    /// the operator aborts.
    fn resolve_file(&mut self, missing: &DiscoveredPath) -> MigrationResult<Option<FileResolution>>;
}

/// Resolver for both secrets and files
pub trait Resolver: SecretResolver + ExtraFileResolver {}

impl<T: SecretResolver + ExtraFileResolver> Resolver for T {}

/// Resolves nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessResolver;

impl SecretResolver for HeadlessResolver {
    fn resolve_secret(&mut self, _: &str, _: &MissingSecret) -> MigrationResult<Option<String>> {
        Ok(None)
    }
}

impl ExtraFileResolver for HeadlessResolver {
    fn resolve_file(&mut self, _: &DiscoveredPath) -> MigrationResult<Option<FileResolution>> {
        Ok(None)
    }
}

/// Answers from pre-recorded values
///
/// Secrets are keyed by target secret key, files by config key.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResolver {
    secrets: HashMap<String, String>,
    files: HashMap<String, FileResolution>,
}

impl ScriptedResolver {
    /// Create resolver with no answers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for a secret
    #[must_use]
    pub fn with_secret(
        mut self,
        target_secret_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.secrets.insert(target_secret_key.into(), value.into());
        self
    }

    /// Answer for a file reference
    #[must_use]
    pub fn with_file(mut self, config_key: impl Into<String>, resolution: FileResolution) -> Self {
        self.files.insert(config_key.into(), resolution);
        self
    }
}

impl SecretResolver for ScriptedResolver {
    fn resolve_secret(
        &mut self,
        _: &str,
        missing: &MissingSecret,
    ) -> MigrationResult<Option<String>> {
        Ok(self.secrets.get(&missing.target_secret_key).cloned())
    }
}

impl ExtraFileResolver for ScriptedResolver {
    fn resolve_file(
        &mut self,
        missing: &DiscoveredPath,
    ) -> MigrationResult<Option<FileResolution>> {
        Ok(self.files.get(&missing.config_key).cloned())
    }
}
