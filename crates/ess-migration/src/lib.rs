//! Configuration migration engine for Element Server Suite
//!
//! Reads legacy Synapse and Matrix Authentication Service configuration
//! files and produces ESS Helm values, with credentials moved into a
//! Kubernetes Secret and referenced files moved into a ConfigMap.
//!
//! # Architecture
//!
//! ```text
//! InputProcessor ──► MigrationEngine ──► MigrationService (per component)
//!                                          ├─ secrets       (schema-driven discovery)
//!                                          ├─ extra_files   (path discovery + import)
//!                                          ├─ transformer   (mapping rules, residual)
//!                                          ├─ mounts        (ConfigMap volumes)
//!                                          └─ overrides     (platform-managed keys)
//!                  MigrationReport ──► outputs (values.yaml, Secret, ConfigMap)
//! ```
//!
//! Discovery never prompts. Unresolved secrets and files are handed to a
//! [`Resolver`] in interactive mode, otherwise validation reports them.
//!
//! # Example
//!
//! ```no_run
//! use ess_migration::{InputProcessor, MigrationEngine, MigrationOptions};
//!
//! let mut inputs = InputProcessor::new();
//! inputs.load("synapse", "homeserver.yaml")?;
//! let report = MigrationEngine::new(MigrationOptions::default()).run(&inputs)?;
//! for warning in report.override_warnings() {
//!     println!("{warning}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod components;
pub mod engine;
pub mod error;
pub mod extra_files;
pub mod inputs;
pub mod mounts;
pub mod options;
pub mod outputs;
pub mod overrides;
pub mod resolver;
pub mod secrets;
pub mod service;
pub mod strategy;
pub mod transformer;

pub use engine::{MigrationEngine, MigrationReport};
pub use error::{MigrationError, MigrationResult, TransformError, ValidationError};
pub use extra_files::{
    discover_extra_files, is_binary, looks_like_file_path, DiscoveredExtraFile, DiscoveredPath,
    ExtraFilesOutcome, BINARY_SNIFF_LEN,
};
pub use inputs::{InputProcessor, MigrationInput};
pub use mounts::{plan_mounts, MountPlan, VolumeMount};
pub use options::MigrationOptions;
pub use outputs::{
    generate_helm_values, kebab_case, resource_name, write_outputs, ConfigMapManifest,
    SecretManifest,
};
pub use overrides::{detect_overrides, OverrideWarning};
pub use resolver::{
    ExtraFileResolver, FileResolution, HeadlessResolver, Resolver, ScriptedResolver,
    SecretResolver,
};
pub use secrets::{
    discover_secrets, DiscoveredSecret, MissingSecret, SecretDiscoveryOutcome, SecretSchemaEntry,
};
pub use service::{ComponentReport, MigrationService};
pub use strategy::{
    Component, ExtraFilesStrategy, MigrationStrategy, OverrideConfigSet, SecretDiscoveryStrategy,
};
pub use transformer::{
    ConfigValueTransformer, TrackedPaths, TransformFn, TransformationResult, TransformationSpec,
    ADDITIONAL_CONFIG_NAME,
};

pub use ess_values::{ConflictPolicy, Value};
