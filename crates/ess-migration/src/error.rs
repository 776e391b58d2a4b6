//! Error types for the migration engine
//!
//! Every fatal error names the offending dotted path and, where one exists,
//! the source file it came from.

use std::fmt;
use std::path::PathBuf;

use ess_values::PathConflict;

use crate::extra_files::DiscoveredPath;

/// Failure of a value transform function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// Value has the wrong shape for this transform
    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Value has the right shape but cannot be interpreted
    #[error("invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },
}

impl TransformError {
    /// Create unexpected type error
    pub fn unexpected_type(expected: &'static str, actual: &'static str) -> Self {
        Self::UnexpectedType { expected, actual }
    }

    /// Create invalid value error
    pub fn invalid_value(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Input document could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Path does not exist
    #[error("file does not exist: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a regular file
    #[error("path is not a file: {0}")]
    NotAFile(PathBuf),

    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File holds no configuration
    #[error("configuration file is empty: {0}")]
    Empty(PathBuf),

    /// File is not valid YAML
    #[error("malformed YAML in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Top level of the document is not a mapping
    #[error("{path} must contain a mapping at the top level, found a {found}")]
    NotAMapping { path: PathBuf, found: &'static str },
}

/// Errors surfaced by a migration run
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Input document failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A required transformation had no source value
    #[error("required configuration value '{path}' is missing from {source_file}")]
    MissingRequiredValue { path: String, source_file: String },

    /// A transformation function rejected its value
    #[error("cannot transform '{path}': {source}")]
    Transform {
        path: String,
        #[source]
        source: TransformError,
    },

    /// Writing to the target document would destroy existing data
    #[error("cannot write '{target}': {source}")]
    PathConflict {
        target: String,
        #[source]
        source: PathConflict,
    },

    /// Required secrets were neither discovered nor supplied
    #[error("missing required {component} secrets: {}", .keys.join(", "))]
    MissingRequiredSecrets { component: String, keys: Vec<String> },

    /// Referenced extra files were neither found nor resolved
    #[error("missing or invalid extra files: {}", MissingList(.paths))]
    MissingExtraFiles { paths: Vec<DiscoveredPath> },

    /// Two ConfigMap keys would be mounted at the same container path
    #[error("cannot mount both {} at {mount_path}", .keys.join(" and "))]
    MountCollision { mount_path: String, keys: Vec<String> },

    /// IO error on an output or referenced file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization failed
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Operator aborted a remediation prompt
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl MigrationError {
    /// Create missing required value error
    pub fn missing_required(path: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self::MissingRequiredValue {
            path: path.into(),
            source_file: source_file.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

struct MissingList<'a>(&'a [DiscoveredPath]);

impl fmt::Display for MissingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, missing) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{} ({} in {})",
                missing.source_path.display(),
                missing.config_key,
                missing.source_file
            )?;
        }
        Ok(())
    }
}

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;
