//! Declarative source-to-target transformation
//!
//! A [`TransformationSpec`] maps one dotted path of a source document to one
//! dotted path of the target document, optionally through a transform
//! function. [`ConfigValueTransformer`] applies a list of specs and remembers
//! every source path it consumed, so the leftover configuration can be
//! computed afterwards with [`ConfigValueTransformer::residual`].
//!
//! Application happens in two phases. All specs are resolved against the
//! source first, in declaration order. The resolved values are then written
//! shallow-before-deep, so specs sharing a target prefix may be declared in
//! any order.

use std::fmt;
use std::sync::Arc;

use ess_values::{
    get, is_empty_document, remove, set_with, to_yaml, ConflictPolicy, Mapping, Value, ValuePath,
};
use tracing::{debug, info};

use crate::error::{MigrationError, MigrationResult, TransformError};

/// File name of the imported configuration under `<component>.additional`
pub const ADDITIONAL_CONFIG_NAME: &str = "00-imported.yaml";

/// Value transform applied between source and target
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, TransformError> + Send + Sync>;

/// One mapping rule from a source path to a target path
#[derive(Clone)]
pub struct TransformationSpec {
    /// Dotted path read from the source document
    pub source_path: String,

    /// Dotted path written in the target document
    pub target_path: String,

    /// Fail the migration when the source value is absent
    pub required: bool,

    /// Optional transform applied to the source value
    pub transform: Option<TransformFn>,
}

impl TransformationSpec {
    /// Create a required mapping
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            required: true,
            transform: None,
        }
    }

    /// Create an optional mapping
    pub fn optional(source_path: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::new(source_path, target_path)
        }
    }

    /// Attach a transform function
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Depth of the target path, used to order writes; malformed paths go last
    fn target_depth(&self) -> usize {
        self.target_path
            .parse::<ValuePath>()
            .map_or(usize::MAX, |path| path.depth())
    }
}

impl fmt::Debug for TransformationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformationSpec")
            .field("source_path", &self.source_path)
            .field("target_path", &self.target_path)
            .field("required", &self.required)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A spec paired with the value it resolved to
#[derive(Debug, Clone)]
pub struct TransformationResult {
    /// The applied spec
    pub spec: TransformationSpec,

    /// Resolved value, after transform
    pub value: Value,
}

/// Source paths consumed during a migration, in first-seen order
///
/// Append-only: a path is never untracked once recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedPaths(Vec<String>);

impl TrackedPaths {
    /// Record a path, returning `false` if it was already tracked
    pub fn track(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.0.push(path);
        true
    }

    /// Check whether a path is tracked
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }

    /// Tracked paths in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of tracked paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Applies transformation specs for one source document
///
/// Holds the tracked-path accumulator for the lifetime of one component
/// migration. Create a fresh transformer per source document.
#[derive(Debug, Clone)]
pub struct ConfigValueTransformer {
    source_file: String,
    policy: ConflictPolicy,
    tracked: TrackedPaths,
}

impl ConfigValueTransformer {
    /// Create transformer for a source file, with strict target writes
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            policy: ConflictPolicy::Strict,
            tracked: TrackedPaths::default(),
        }
    }

    /// Set the conflict policy used for target writes
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Source file this transformer reads from
    #[must_use]
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Conflict policy for target writes
    #[must_use]
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Paths consumed so far
    #[must_use]
    pub fn tracked(&self) -> &TrackedPaths {
        &self.tracked
    }

    /// Mark a source path as consumed outside of a spec
    pub fn track(&mut self, path: impl Into<String>) {
        self.tracked.track(path);
    }

    /// Apply `specs` against `source`, writing into `target`
    ///
    /// Returns one result per resolved spec, in declaration order. A
    /// `null` source value counts as absent. A transform that yields
    /// `null` is recorded and tracked but nothing is written.
    ///
    /// # Errors
    /// - [`MigrationError::MissingRequiredValue`] for an absent required source
    /// - [`MigrationError::Transform`] when a transform fails
    /// - [`MigrationError::PathConflict`] when a write is blocked
    ///
    /// On the first two, values resolved from specs declared before the
    /// failing one are still written before the error is returned.
    pub fn apply(
        &mut self,
        source: &Value,
        specs: &[TransformationSpec],
        target: &mut Value,
    ) -> MigrationResult<Vec<TransformationResult>> {
        let mut resolved = Vec::with_capacity(specs.len());
        let mut failure = None;

        for spec in specs {
            match self.resolve(source, spec) {
                Ok(Some(result)) => resolved.push(result),
                Ok(None) => {}
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        self.write(&resolved, target)?;

        match failure {
            Some(err) => Err(err),
            None => Ok(resolved),
        }
    }

    fn resolve(
        &mut self,
        source: &Value,
        spec: &TransformationSpec,
    ) -> MigrationResult<Option<TransformationResult>> {
        let Some(value) = get(source, &spec.source_path).filter(|v| !v.is_null()) else {
            if spec.required {
                return Err(MigrationError::missing_required(
                    &spec.source_path,
                    &self.source_file,
                ));
            }
            debug!(path = %spec.source_path, "optional value absent, skipping");
            return Ok(None);
        };

        let value = match &spec.transform {
            Some(transform) => transform(value).map_err(|source| MigrationError::Transform {
                path: spec.source_path.clone(),
                source,
            })?,
            None => value.clone(),
        };

        self.tracked.track(&spec.source_path);
        Ok(Some(TransformationResult {
            spec: spec.clone(),
            value,
        }))
    }

    fn write(&self, resolved: &[TransformationResult], target: &mut Value) -> MigrationResult<()> {
        let mut order: Vec<&TransformationResult> = resolved.iter().collect();
        order.sort_by_key(|result| result.spec.target_depth());

        for result in order {
            let spec = &result.spec;
            if result.value.is_null() {
                debug!(
                    source = %spec.source_path,
                    target = %spec.target_path,
                    "transform produced no value, not written"
                );
                continue;
            }
            set_with(target, &spec.target_path, result.value.clone(), self.policy).map_err(
                |source| MigrationError::PathConflict {
                    target: spec.target_path.clone(),
                    source,
                },
            )?;
            info!(source = %spec.source_path, target = %spec.target_path, "migrated value");
        }
        Ok(())
    }

    /// Deep copy of `source` with every tracked path removed
    ///
    /// Repeated calls return identical documents until a new path is tracked.
    #[must_use]
    pub fn residual(&self, source: &Value) -> Value {
        let mut filtered = source.clone();
        for path in self.tracked.iter() {
            remove(&mut filtered, path);
        }
        filtered
    }

    /// Attach the residual of `source` as additional configuration
    ///
    /// Returns `false` without touching `target` when nothing is left.
    ///
    /// # Errors
    /// Fails when the residual cannot be rendered or the component node is
    /// blocked by a scalar.
    pub fn fold_residual_into(
        &self,
        component_key: &str,
        source: &Value,
        target: &mut Value,
    ) -> MigrationResult<bool> {
        attach_additional_config(component_key, &self.residual(source), target, self.policy)
    }
}

/// Write `residual` as YAML text under `<component>.additional`
///
/// The text lands at `additional."00-imported.yaml".config`. Empty
/// documents are not attached.
///
/// # Errors
/// Fails when the residual cannot be rendered or the component node is
/// blocked by a scalar.
pub fn attach_additional_config(
    component_key: &str,
    residual: &Value,
    target: &mut Value,
    policy: ConflictPolicy,
) -> MigrationResult<bool> {
    if is_empty_document(residual) {
        debug!(component = component_key, "no additional configuration to import");
        return Ok(false);
    }

    let mut imported = Mapping::new();
    imported.insert("config".into(), Value::String(to_yaml(residual)?));
    let mut additional = Mapping::new();
    additional.insert(ADDITIONAL_CONFIG_NAME.into(), Value::Mapping(imported));

    let path = format!("{component_key}.additional");
    set_with(target, &path, Value::Mapping(additional), policy).map_err(|source| {
        MigrationError::PathConflict {
            target: path.clone(),
            source,
        }
    })?;
    info!(component = component_key, "attached additional configuration");
    Ok(true)
}
