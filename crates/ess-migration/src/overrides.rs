//! Detection of platform-managed settings left in the residual
//!
//! A warning is raised for an override path only when it still holds a
//! value after filtering and no transformation reads it. Paths with an
//! explicit transformation are reported as migrated instead.

use std::fmt;

use ess_values::{get, Value};
use tracing::warn;

use crate::strategy::MigrationStrategy;
use crate::transformer::ADDITIONAL_CONFIG_NAME;

/// A platform-managed setting found in the imported configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideWarning {
    /// Dotted path in the source document
    pub config_path: String,

    /// Component that owns the setting
    pub component_root_key: String,

    /// Source file the setting came from
    pub source_file: String,
}

impl fmt::Display for OverrideWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' from {} found in {}.additional[\"{}\"].config",
            self.config_path, self.source_file, self.component_root_key, ADDITIONAL_CONFIG_NAME
        )
    }
}

/// Compare a strategy's override set against a residual document
///
/// Warnings come out sorted by config path.
#[must_use]
pub fn detect_overrides(
    strategy: &dyn MigrationStrategy,
    residual: &Value,
    source_file: &str,
) -> Vec<OverrideWarning> {
    let transformed: Vec<String> = strategy
        .transformations()
        .into_iter()
        .map(|spec| spec.source_path)
        .collect();

    let warnings: Vec<OverrideWarning> = strategy
        .override_configs()
        .iter()
        .filter(|path| !transformed.iter().any(|t| t.as_str() == *path))
        .filter(|path| get(residual, path).is_some_and(|v| !v.is_null()))
        .map(|path| OverrideWarning {
            config_path: path.to_string(),
            component_root_key: strategy.component_root_key().to_string(),
            source_file: source_file.to_string(),
        })
        .collect();

    if !warnings.is_empty() {
        warn!(
            component = strategy.component_root_key(),
            count = warnings.len(),
            "configuration contains platform-managed overrides"
        );
        for warning in &warnings {
            warn!("{warning}");
        }
    }
    warnings
}
