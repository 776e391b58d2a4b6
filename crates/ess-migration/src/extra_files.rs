//! Discovery of auxiliary files referenced by a source document
//!
//! Every string leaf that looks like a filesystem path is recorded as a
//! [`DiscoveredPath`]. Paths owned by secret discovery or listed as ignored
//! by the component are recorded but skipped. The rest are resolved on
//! disk: files are imported directly, directories contribute their
//! immediate file children. Files reached through several references are
//! imported once and remember every reference.
//!
//! Binary detection looks for a NUL byte in the first
//! [`BINARY_SNIFF_LEN`] bytes. Text encodings without NUL bytes near the
//! start (UTF-16 without BOM padding, for instance) can be misclassified
//! as cleartext.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ess_values::{string_leaves, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{MigrationError, MigrationResult};
use crate::resolver::{ExtraFileResolver, FileResolution};
use crate::strategy::{ExtraFilesStrategy, SecretDiscoveryStrategy};

/// Number of leading bytes inspected by binary detection
pub const BINARY_SNIFF_LEN: usize = 1024;

static FILE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:/[^/]|\./|\.\./|~/.)").expect("valid file path regex"));

static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid scheme regex"));

/// A config value that looks like a filesystem path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPath {
    /// Dotted path into the source document
    pub config_key: String,

    /// Source configuration file
    pub source_file: String,

    /// Filesystem path as written in the configuration
    pub source_path: PathBuf,

    /// Why this reference is not imported
    pub skipped_reason: Option<String>,

    /// The reference resolved to a directory
    pub is_directory: bool,
}

impl DiscoveredPath {
    /// Create an unskipped reference
    pub fn new(
        config_key: impl Into<String>,
        source_file: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_key: config_key.into(),
            source_file: source_file.into(),
            source_path: source_path.into(),
            skipped_reason: None,
            is_directory: false,
        }
    }

    /// Check whether this reference is skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped_reason.is_some()
    }

    fn same_reference(&self, other: &Self) -> bool {
        self.config_key == other.config_key && self.source_file == other.source_file
    }
}

/// A file to import, with every reference that reached it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredExtraFile {
    /// File name
    pub filename: String,

    /// Canonical location on disk
    pub resolved_path: PathBuf,

    /// File content
    pub content: Vec<u8>,

    /// No NUL byte in the first [`BINARY_SNIFF_LEN`] bytes
    pub cleartext: bool,

    /// References that resolved to this file, in discovery order
    pub discovered_source_paths: Vec<DiscoveredPath>,
}

/// Check whether a config string looks like a filesystem path
///
/// Absolute, `./`, `../` and `~/` paths qualify. Anything with a URI
/// scheme does not.
#[must_use]
pub fn looks_like_file_path(value: &str) -> bool {
    !URI_SCHEME.is_match(value) && FILE_PATH.is_match(value)
}

/// Binary heuristic over the first [`BINARY_SNIFF_LEN`] bytes
#[inline]
#[must_use]
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(BINARY_SNIFF_LEN).any(|b| *b == 0)
}

/// Expand a leading `~/` to the home directory
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Result of extra-file discovery for one source document
#[derive(Debug, Clone, Default)]
pub struct ExtraFilesOutcome {
    discovered_paths: Vec<DiscoveredPath>,
    files: BTreeMap<PathBuf, DiscoveredExtraFile>,
}

impl ExtraFilesOutcome {
    /// Create outcome from references, with nothing resolved yet
    #[must_use]
    pub fn from_paths(discovered_paths: Vec<DiscoveredPath>) -> Self {
        Self {
            discovered_paths,
            files: BTreeMap::new(),
        }
    }

    /// Every path-like reference, skipped ones included
    #[must_use]
    pub fn discovered_paths(&self) -> &[DiscoveredPath] {
        &self.discovered_paths
    }

    /// Imported files, ordered by resolved path
    pub fn files(&self) -> impl Iterator<Item = &DiscoveredExtraFile> {
        self.files.values()
    }

    /// Number of imported files
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Consume into the imported files
    #[must_use]
    pub fn into_files(self) -> Vec<DiscoveredExtraFile> {
        self.files.into_values().collect()
    }

    /// Unskipped references that resolved to nothing
    ///
    /// An existing directory without files is not missing.
    #[must_use]
    pub fn missing(&self) -> Vec<&DiscoveredPath> {
        self.discovered_paths
            .iter()
            .filter(|dp| !dp.is_skipped() && !dp.is_directory)
            .filter(|dp| !self.is_imported(dp))
            .collect()
    }

    fn is_imported(&self, reference: &DiscoveredPath) -> bool {
        self.files.values().any(|file| {
            file.discovered_source_paths
                .iter()
                .any(|p| p.same_reference(reference))
        })
    }

    /// Resolve every unskipped reference on disk
    ///
    /// References to paths that do not exist are left for [`missing`].
    ///
    /// # Errors
    /// Fails when a directory cannot be listed or an existing file cannot
    /// be read.
    ///
    /// [`missing`]: Self::missing
    pub fn resolve_files(&mut self) -> MigrationResult<()> {
        info!("resolving extra files");
        for index in 0..self.discovered_paths.len() {
            if self.discovered_paths[index].is_skipped() {
                continue;
            }
            let location = expand_home(&self.discovered_paths[index].source_path.to_string_lossy());
            self.resolve_at(index, &location)?;
        }
        Ok(())
    }

    fn resolve_at(&mut self, index: usize, location: &Path) -> MigrationResult<bool> {
        if location.is_dir() {
            self.discovered_paths[index].is_directory = true;
            let reference = self.discovered_paths[index].clone();
            let children = list_files(location)?;
            if children.is_empty() {
                warn!(directory = %location.display(), "no files found in directory");
            } else {
                info!(
                    directory = %location.display(),
                    count = children.len(),
                    "found files in directory"
                );
            }
            for child in &children {
                self.register(child, reference.clone())?;
            }
            Ok(true)
        } else if location.is_file() {
            let reference = self.discovered_paths[index].clone();
            self.register(location, reference)?;
            Ok(true)
        } else {
            debug!(path = %location.display(), "referenced path does not exist");
            Ok(false)
        }
    }

    fn register(&mut self, path: &Path, reference: DiscoveredPath) -> MigrationResult<()> {
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        if let Some(existing) = self.files.get_mut(&resolved) {
            if !existing
                .discovered_source_paths
                .iter()
                .any(|p| p.same_reference(&reference))
            {
                debug!(
                    file = %resolved.display(),
                    key = %reference.config_key,
                    "file referenced again"
                );
                existing.discovered_source_paths.push(reference);
            }
            return Ok(());
        }

        let content = std::fs::read(path).map_err(|err| MigrationError::io_error(path, err))?;
        let cleartext = !is_binary(&content);
        let filename = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %resolved.display(), cleartext, "importing extra file");

        self.files.insert(
            resolved.clone(),
            DiscoveredExtraFile {
                filename,
                resolved_path: resolved,
                content,
                cleartext,
                discovered_source_paths: vec![reference],
            },
        );
        Ok(())
    }

    /// Offer every missing reference to `resolver`
    ///
    /// # Errors
    /// Propagates resolver errors and IO errors while importing.
    pub fn resolve_with<R: ExtraFileResolver + ?Sized>(
        &mut self,
        resolver: &mut R,
    ) -> MigrationResult<()> {
        let pending: Vec<usize> = (0..self.discovered_paths.len())
            .filter(|&i| {
                let dp = &self.discovered_paths[i];
                !dp.is_skipped() && !dp.is_directory && !self.is_imported(dp)
            })
            .collect();

        for index in pending {
            let reference = self.discovered_paths[index].clone();
            match resolver.resolve_file(&reference)? {
                Some(FileResolution::Skip) => {
                    info!(key = %reference.config_key, "extra file skipped by operator");
                    self.discovered_paths[index].skipped_reason =
                        Some("skipped by operator".into());
                }
                Some(FileResolution::Alternative(path)) => {
                    if path.is_file() {
                        self.register(&path, reference)?;
                    } else {
                        warn!(
                            key = %reference.config_key,
                            path = %path.display(),
                            "alternative is not a file"
                        );
                    }
                }
                Some(FileResolution::SearchDirectory(dir)) => {
                    let candidate = reference
                        .source_path
                        .file_name()
                        .map(|name| dir.join(name));
                    match candidate {
                        Some(candidate) if self.resolve_at(index, &candidate)? => {}
                        _ => warn!(
                            key = %reference.config_key,
                            directory = %dir.display(),
                            "no matching entry in search directory"
                        ),
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Fail if any unskipped reference is still unresolved
    ///
    /// # Errors
    /// [`MigrationError::MissingExtraFiles`] naming every missing path.
    pub fn validate(&self) -> MigrationResult<()> {
        let missing = self.missing();
        if missing.is_empty() {
            info!(files = self.files.len(), "extra files validated");
            return Ok(());
        }
        Err(MigrationError::MissingExtraFiles {
            paths: missing.into_iter().cloned().collect(),
        })
    }
}

fn list_files(directory: &Path) -> MigrationResult<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(directory).map_err(|err| MigrationError::io_error(directory, err))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MigrationError::io_error(directory, err))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Scan `source` for file references and resolve them on disk
///
/// References whose config key is a file reference of `secrets` are
/// recorded as skipped, as are those at or below one of `strategy`'s
/// ignored keys.
///
/// # Errors
/// See [`ExtraFilesOutcome::resolve_files`].
pub fn discover_extra_files(
    strategy: &dyn ExtraFilesStrategy,
    secrets: Option<&dyn SecretDiscoveryStrategy>,
    source: &Value,
    source_file: &str,
) -> MigrationResult<ExtraFilesOutcome> {
    info!(component = strategy.component_name(), "discovering extra files");

    let secret_keys = secrets.map(|s| s.file_reference_keys()).unwrap_or_default();
    let ignored = strategy.ignored_config_keys();

    let paths = string_leaves(source)
        .into_iter()
        .filter(|(_, value)| looks_like_file_path(value))
        .map(|(key, value)| {
            let mut reference = DiscoveredPath::new(key.as_str(), source_file, value);
            if secret_keys.iter().any(|k| key == k.as_str()) {
                info!(key = %key, "skipping path managed by secret discovery");
                reference.skipped_reason =
                    Some(format!("{key} = {value} is already managed by a secret"));
            } else if ignored.iter().any(|k| key.is_within(k)) {
                info!(key = %key, "skipping ignored path");
                reference.skipped_reason = Some(format!("{key} = {value} is not imported"));
            }
            reference
        })
        .collect();

    let mut outcome = ExtraFilesOutcome::from_paths(paths);
    outcome.resolve_files()?;
    Ok(outcome)
}
