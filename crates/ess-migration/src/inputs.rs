//! Loading of source configuration documents

use std::path::{Path, PathBuf};

use ess_values::{is_empty_document, kind_of, Value};
use tracing::{debug, info};

use crate::error::ValidationError;

/// One loaded source document
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationInput {
    /// Component root key the document belongs to
    pub name: String,

    /// Where the document was read from
    pub config_path: PathBuf,

    /// Parsed document, always a mapping
    pub config: Value,
}

impl MigrationInput {
    /// Source file label used in reports and errors
    #[must_use]
    pub fn source_file(&self) -> String {
        self.config_path.display().to_string()
    }
}

/// Loads and validates source documents before any migration work
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    inputs: Vec<MigrationInput>,
}

impl InputProcessor {
    /// Create processor with no inputs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document at `path` for component `name`
    ///
    /// # Errors
    /// [`ValidationError`] when the file is missing, not a file, unreadable,
    /// empty, malformed, or not a mapping at the top level.
    pub fn load(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        let path = path.as_ref();
        let config = load_yaml_file(path)?;
        info!(component = %name, path = %path.display(), "configuration loaded");
        self.inputs.push(MigrationInput {
            name,
            config_path: path.to_path_buf(),
            config,
        });
        Ok(())
    }

    /// Add an already parsed document
    pub fn push(&mut self, input: MigrationInput) {
        self.inputs.push(input);
    }

    /// Input for a component, if one was loaded
    #[must_use]
    pub fn input_for_component(&self, component_root_key: &str) -> Option<&MigrationInput> {
        self.inputs.iter().find(|i| i.name == component_root_key)
    }

    /// All loaded inputs
    #[must_use]
    pub fn inputs(&self) -> &[MigrationInput] {
        &self.inputs
    }

    /// Check if nothing was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Read and parse a YAML configuration file
///
/// # Errors
/// See [`InputProcessor::load`].
pub fn load_yaml_file(path: &Path) -> Result<Value, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| ValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ValidationError::Empty(path.to_path_buf()));
    }

    let config: Value = serde_yaml::from_str(&text).map_err(|source| ValidationError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "parsed YAML");

    match config {
        Value::Mapping(_) if is_empty_document(&config) => {
            Err(ValidationError::Empty(path.to_path_buf()))
        }
        Value::Mapping(_) => Ok(config),
        Value::Null => Err(ValidationError::Empty(path.to_path_buf())),
        other => Err(ValidationError::NotAMapping {
            path: path.to_path_buf(),
            found: kind_of(&other),
        }),
    }
}
