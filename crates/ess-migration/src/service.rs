//! Migration of one component
//!
//! [`MigrationService::migrate`] runs the whole pipeline for one source
//! document:
//!
//! 1. discover secrets, offer missing ones to the resolver, validate
//! 2. discover extra files, offer missing ones to the resolver, validate
//! 3. mark the component enabled
//! 4. apply the mapping rules
//! 5. replace discovered secrets by references to the generated Secret
//! 6. mount extra files and point their references at the mounts
//! 7. report platform-managed settings left in the residual
//! 8. attach the residual as additional configuration

use ess_values::{set_with, Mapping, Value};
use tracing::info;

use crate::error::{MigrationError, MigrationResult};
use crate::extra_files::{discover_extra_files, DiscoveredExtraFile, DiscoveredPath};
use crate::inputs::MigrationInput;
use crate::mounts::plan_mounts;
use crate::options::MigrationOptions;
use crate::outputs::{resource_name, ConfigMapManifest, SecretManifest};
use crate::overrides::{detect_overrides, OverrideWarning};
use crate::resolver::Resolver;
use crate::secrets::{discover_secrets, DiscoveredSecret, SecretDiscoveryOutcome};
use crate::strategy::Component;
use crate::transformer::{attach_additional_config, ConfigValueTransformer, TransformationResult};

/// Everything one component migration produced
#[derive(Debug, Clone)]
pub struct ComponentReport {
    /// Component root key
    pub root_key: String,

    /// Source file label
    pub source_file: String,

    /// Applied mappings, in declaration order
    pub results: Vec<TransformationResult>,

    /// Secrets moved into the generated Secret
    pub discovered_secrets: Vec<DiscoveredSecret>,

    /// Secrets the platform will generate
    pub init_by_platform: Vec<String>,

    /// Every path-like reference found, skipped ones included
    pub discovered_paths: Vec<DiscoveredPath>,

    /// Imported files
    pub extra_files: Vec<DiscoveredExtraFile>,

    /// Platform-managed settings found in the residual
    pub override_warnings: Vec<OverrideWarning>,

    /// Generated Secret, when secrets were discovered
    pub secret: Option<SecretManifest>,

    /// Generated ConfigMap, when files were imported
    pub config_map: Option<ConfigMapManifest>,

    /// Residual configuration was attached
    pub has_additional_config: bool,
}

/// Runs one component's migration against a shared values document
#[derive(Debug, Clone, Copy)]
pub struct MigrationService<'a> {
    component: &'a Component,
    options: &'a MigrationOptions,
}

impl<'a> MigrationService<'a> {
    /// Create service for a component
    #[must_use]
    pub fn new(component: &'a Component, options: &'a MigrationOptions) -> Self {
        Self { component, options }
    }

    /// Migrate `input` into `target`
    ///
    /// The resolver is consulted only when the options are interactive.
    ///
    /// # Errors
    /// Any [`MigrationError`]. Earlier steps may already have written to
    /// `target`; callers discard the whole run on error.
    pub fn migrate<R: Resolver + ?Sized>(
        &self,
        input: &MigrationInput,
        target: &mut Value,
        resolver: &mut R,
    ) -> MigrationResult<ComponentReport> {
        let root_key = self.component.root_key();
        let policy = self.options.conflict_policy;
        let source = &input.config;
        let source_file = input.source_file();
        info!(component = root_key, source = %source_file, "migrating component");

        let secrets = self.discover_secrets(input, resolver)?;

        let extra_files = match &self.component.extra_files {
            Some(strategy) => {
                let mut outcome = discover_extra_files(
                    strategy.as_ref(),
                    self.component.secrets.as_deref(),
                    source,
                    &source_file,
                )?;
                if self.options.interactive {
                    outcome.resolve_with(resolver)?;
                }
                outcome.validate()?;
                Some(outcome)
            }
            None => None,
        };

        self.write(target, &format!("{root_key}.enabled"), Value::Bool(true))?;

        let mut transformer =
            ConfigValueTransformer::new(&source_file).with_conflict_policy(policy);
        let specs = self.component.migration.transformations();
        let results = transformer.apply(source, &specs, target)?;

        let (discovered_secrets, init_by_platform) = match secrets {
            Some(outcome) => (outcome.discovered, outcome.init_by_platform),
            None => (Vec::new(), Vec::new()),
        };
        let secret = SecretManifest::from_secrets(root_key, &discovered_secrets);
        for discovered in &discovered_secrets {
            let mut reference = Mapping::new();
            reference.insert("secret".into(), Value::String(resource_name(root_key)));
            reference.insert(
                "secretKey".into(),
                Value::String(discovered.target_secret_key.clone()),
            );
            self.write(target, &discovered.target_secret_key, Value::Mapping(reference))?;
            if let Some(config_key) = &discovered.source_config_path {
                transformer.track(config_key);
            }
        }

        let mut residual = transformer.residual(source);

        let (discovered_paths, files) = match extra_files {
            Some(outcome) => (outcome.discovered_paths().to_vec(), outcome.into_files()),
            None => (Vec::new(), Vec::new()),
        };
        let mount_dir = self
            .component
            .extra_files
            .as_ref()
            .and_then(|s| s.mount_path())
            .unwrap_or_else(|| self.options.extra_mount_dir(root_key));
        let plan = plan_mounts(root_key, &mount_dir, &files)?;
        plan.rewrite_references(&mut residual, policy)?;
        plan.attach(root_key, target, policy)?;
        let config_map = ConfigMapManifest::from_files(&plan, &files);

        let override_warnings =
            detect_overrides(self.component.migration.as_ref(), &residual, &source_file);

        let has_additional_config = attach_additional_config(root_key, &residual, target, policy)?;

        info!(
            component = root_key,
            migrated = results.len(),
            secrets = discovered_secrets.len(),
            files = files.len(),
            warnings = override_warnings.len(),
            "component migrated"
        );

        Ok(ComponentReport {
            root_key: root_key.to_string(),
            source_file,
            results,
            discovered_secrets,
            init_by_platform,
            discovered_paths,
            extra_files: files,
            override_warnings,
            secret,
            config_map,
            has_additional_config,
        })
    }

    fn discover_secrets<R: Resolver + ?Sized>(
        &self,
        input: &MigrationInput,
        resolver: &mut R,
    ) -> MigrationResult<Option<SecretDiscoveryOutcome>> {
        let Some(strategy) = &self.component.secrets else {
            return Ok(None);
        };
        let mut outcome = discover_secrets(strategy.as_ref(), &input.config, &input.source_file())?;
        if self.options.interactive {
            outcome.resolve_with(resolver)?;
        }
        outcome.validate()?;
        Ok(Some(outcome))
    }

    fn write(&self, target: &mut Value, path: &str, value: Value) -> MigrationResult<()> {
        set_with(target, path, value, self.options.conflict_policy).map_err(|source| {
            MigrationError::PathConflict {
                target: path.to_string(),
                source,
            }
        })
    }
}
