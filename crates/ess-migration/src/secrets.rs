//! Schema-driven credential discovery
//!
//! Each [`SecretSchemaEntry`] says where one credential may be found in a
//! source document: inline at a config key, or in a file whose path is
//! stored at a config key. Inline wins when both resolve.
//!
//! Discovery is lenient per entry. A missing referenced file or a failing
//! transform leaves that one secret undiscovered and the pass continues.
//! Whether an undiscovered secret is fatal depends on the entry: platform
//! generated secrets are listed for information, required ones are
//! reported by [`SecretDiscoveryOutcome::validate`].

use std::fmt;
use std::io;
use std::sync::Arc;

use ess_values::{get, kind_of, Value};
use tracing::{debug, info, warn};

use crate::error::{MigrationError, MigrationResult, TransformError};
use crate::extra_files::expand_home;
use crate::resolver::SecretResolver;
use crate::strategy::SecretDiscoveryStrategy;

/// Transform applied to a raw secret value
///
/// `Ok(None)` means the raw value holds no secret.
pub type SecretTransformFn =
    Arc<dyn Fn(&str) -> Result<Option<String>, TransformError> + Send + Sync>;

/// Where one secret is located in a source document
#[derive(Clone)]
pub struct SecretSchemaEntry {
    /// Key of the secret in the target platform (also its target path)
    pub target_secret_key: String,

    /// Human-readable description, shown when prompting
    pub description: String,

    /// Config key holding the secret inline
    pub inline_source_path: Option<String>,

    /// Config key holding the path of a file containing the secret
    pub file_reference_source_path: Option<String>,

    /// Fail validation when the secret is not found
    ///
    /// When `false` the platform generates the secret itself.
    pub required_if_missing: bool,

    /// Optional transform applied to the raw value
    pub transform: Option<SecretTransformFn>,
}

impl SecretSchemaEntry {
    /// Create a required entry with no source locations
    pub fn new(target_secret_key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            target_secret_key: target_secret_key.into(),
            description: description.into(),
            inline_source_path: None,
            file_reference_source_path: None,
            required_if_missing: true,
            transform: None,
        }
    }

    /// Read the secret inline from `path`
    #[must_use]
    pub fn inline(mut self, path: impl Into<String>) -> Self {
        self.inline_source_path = Some(path.into());
        self
    }

    /// Read the secret from the file named at `path`
    #[must_use]
    pub fn file_reference(mut self, path: impl Into<String>) -> Self {
        self.file_reference_source_path = Some(path.into());
        self
    }

    /// Let the platform generate the secret when it is not found
    #[must_use]
    pub fn platform_generated(mut self) -> Self {
        self.required_if_missing = false;
        self
    }

    /// Attach a transform
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> Result<Option<String>, TransformError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Config key an operator-supplied value is associated with
    ///
    /// The file reference is preferred, the inline key is the fallback.
    #[must_use]
    pub fn preferred_config_key(&self) -> Option<&str> {
        self.file_reference_source_path
            .as_deref()
            .or(self.inline_source_path.as_deref())
    }
}

impl fmt::Debug for SecretSchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSchemaEntry")
            .field("target_secret_key", &self.target_secret_key)
            .field("inline_source_path", &self.inline_source_path)
            .field("file_reference_source_path", &self.file_reference_source_path)
            .field("required_if_missing", &self.required_if_missing)
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

/// A secret resolved to a concrete value
#[derive(Clone, PartialEq, Eq)]
pub struct DiscoveredSecret {
    /// Source configuration file
    pub source_file: String,

    /// Key of the secret in the target platform
    pub target_secret_key: String,

    /// Config key the value was read from, if any
    pub source_config_path: Option<String>,

    /// Secret value
    pub value: String,
}

impl fmt::Debug for DiscoveredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredSecret")
            .field("source_file", &self.source_file)
            .field("target_secret_key", &self.target_secret_key)
            .field("source_config_path", &self.source_config_path)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// A required secret that was not discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSecret {
    /// Key of the secret in the target platform
    pub target_secret_key: String,

    /// Human-readable description
    pub description: String,

    /// Config key a supplied value is associated with
    pub config_key: Option<String>,
}

/// Result of one secret discovery pass
#[derive(Debug, Clone)]
pub struct SecretDiscoveryOutcome {
    /// Component the secrets belong to
    pub component_name: String,

    /// Source configuration file
    pub source_file: String,

    /// Resolved secrets, in schema order
    pub discovered: Vec<DiscoveredSecret>,

    /// Secrets the platform will generate itself
    pub init_by_platform: Vec<String>,

    /// Required secrets still unresolved
    pub missing: Vec<MissingSecret>,
}

impl SecretDiscoveryOutcome {
    /// Offer every missing secret to `resolver`
    ///
    /// Supplied values move from `missing` to `discovered`. Empty values are
    /// ignored.
    ///
    /// # Errors
    /// Propagates resolver errors such as a cancelled prompt.
    pub fn resolve_with<R: SecretResolver + ?Sized>(
        &mut self,
        resolver: &mut R,
    ) -> MigrationResult<()> {
        if self.missing.is_empty() {
            return Ok(());
        }

        let mut still_missing = Vec::new();
        for missing in std::mem::take(&mut self.missing) {
            match resolver.resolve_secret(&self.component_name, &missing)? {
                Some(value) if !value.is_empty() => {
                    info!(secret = %missing.target_secret_key, "secret supplied by operator");
                    self.discovered.push(DiscoveredSecret {
                        source_file: self.source_file.clone(),
                        target_secret_key: missing.target_secret_key,
                        source_config_path: missing.config_key,
                        value,
                    });
                }
                _ => still_missing.push(missing),
            }
        }
        self.missing = still_missing;
        Ok(())
    }

    /// Fail if any required secret is still missing
    ///
    /// # Errors
    /// [`MigrationError::MissingRequiredSecrets`] naming every missing key.
    pub fn validate(&self) -> MigrationResult<()> {
        if self.missing.is_empty() {
            info!(component = %self.component_name, "all required secrets are present");
            return Ok(());
        }
        Err(MigrationError::MissingRequiredSecrets {
            component: self.component_name.clone(),
            keys: self
                .missing
                .iter()
                .map(|m| m.target_secret_key.clone())
                .collect(),
        })
    }

    /// Look up a discovered secret by target key
    #[must_use]
    pub fn get(&self, target_secret_key: &str) -> Option<&DiscoveredSecret> {
        self.discovered
            .iter()
            .find(|s| s.target_secret_key == target_secret_key)
    }
}

/// Run the secret schema of `strategy` against `source`
///
/// # Errors
/// Only for IO failures other than a missing referenced file.
pub fn discover_secrets(
    strategy: &dyn SecretDiscoveryStrategy,
    source: &Value,
    source_file: &str,
) -> MigrationResult<SecretDiscoveryOutcome> {
    info!(component = strategy.component_name(), "discovering secrets");

    let mut outcome = SecretDiscoveryOutcome {
        component_name: strategy.component_name().to_string(),
        source_file: source_file.to_string(),
        discovered: Vec::new(),
        init_by_platform: Vec::new(),
        missing: Vec::new(),
    };

    for entry in strategy.secret_schema() {
        match locate(&entry, source)? {
            Some((config_key, value)) => {
                debug!(secret = %entry.target_secret_key, from = %config_key, "secret found");
                outcome.discovered.push(DiscoveredSecret {
                    source_file: source_file.to_string(),
                    target_secret_key: entry.target_secret_key,
                    source_config_path: Some(config_key),
                    value,
                });
            }
            None if entry.required_if_missing => {
                warn!(secret = %entry.target_secret_key, "required secret not found");
                outcome.missing.push(MissingSecret {
                    config_key: entry.preferred_config_key().map(str::to_string),
                    target_secret_key: entry.target_secret_key,
                    description: entry.description,
                });
            }
            None => {
                info!(
                    secret = %entry.target_secret_key,
                    "secret will be generated by the platform"
                );
                outcome.init_by_platform.push(entry.target_secret_key);
            }
        }
    }

    Ok(outcome)
}

/// Find the raw value of one entry and apply its transform
fn locate(entry: &SecretSchemaEntry, source: &Value) -> MigrationResult<Option<(String, String)>> {
    let raw = match read_inline(entry, source) {
        Some(found) => Some(found),
        None => read_file_reference(entry, source)?,
    };

    let Some((config_key, raw)) = raw else {
        return Ok(None);
    };

    let Some(transform) = &entry.transform else {
        return Ok(Some((config_key, raw)));
    };

    match transform(&raw) {
        Ok(Some(value)) => Ok(Some((config_key, value))),
        Ok(None) => {
            debug!(secret = %entry.target_secret_key, "transform found no secret");
            Ok(None)
        }
        Err(err) => {
            warn!(secret = %entry.target_secret_key, error = %err, "secret transform failed");
            Ok(None)
        }
    }
}

fn read_inline(entry: &SecretSchemaEntry, source: &Value) -> Option<(String, String)> {
    let path = entry.inline_source_path.as_deref()?;
    let value = scalar_text(entry, get(source, path)?)?;
    Some((path.to_string(), value))
}

fn read_file_reference(
    entry: &SecretSchemaEntry,
    source: &Value,
) -> MigrationResult<Option<(String, String)>> {
    let Some(path) = entry.file_reference_source_path.as_deref() else {
        return Ok(None);
    };
    let Some(file) = get(source, path).and_then(|v| scalar_text(entry, v)) else {
        return Ok(None);
    };

    let file = expand_home(&file);
    match std::fs::read_to_string(&file) {
        Ok(content) => {
            debug!(secret = %entry.target_secret_key, file = %file.display(), "read secret file");
            Ok(Some((path.to_string(), content)))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(
                secret = %entry.target_secret_key,
                file = %file.display(),
                "secret file not found"
            );
            Ok(None)
        }
        Err(err) => Err(MigrationError::io_error(file, err)),
    }
}

fn scalar_text(entry: &SecretSchemaEntry, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            warn!(
                secret = %entry.target_secret_key,
                found = kind_of(other),
                "secret value is not a scalar, ignoring"
            );
            None
        }
    }
}
