//! Migration orchestration across components

use ess_values::{Mapping, Value};
use tracing::{debug, info};

use crate::components;
use crate::error::MigrationResult;
use crate::extra_files::DiscoveredExtraFile;
use crate::inputs::InputProcessor;
use crate::options::MigrationOptions;
use crate::overrides::OverrideWarning;
use crate::resolver::{HeadlessResolver, Resolver};
use crate::secrets::DiscoveredSecret;
use crate::service::{ComponentReport, MigrationService};
use crate::strategy::Component;

/// Outcome of a full migration run
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// The values document
    pub values: Value,

    /// Per-component details, in migration order
    pub components: Vec<ComponentReport>,
}

impl MigrationReport {
    /// Report of one component
    #[must_use]
    pub fn component(&self, root_key: &str) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.root_key == root_key)
    }

    /// Override warnings across all components
    pub fn override_warnings(&self) -> impl Iterator<Item = &OverrideWarning> {
        self.components.iter().flat_map(|c| &c.override_warnings)
    }

    /// Discovered secrets across all components
    pub fn discovered_secrets(&self) -> impl Iterator<Item = &DiscoveredSecret> {
        self.components.iter().flat_map(|c| &c.discovered_secrets)
    }

    /// Secrets the platform will generate, across all components
    pub fn init_by_platform(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .flat_map(|c| c.init_by_platform.iter().map(String::as_str))
    }

    /// Imported files across all components
    pub fn extra_files(&self) -> impl Iterator<Item = &DiscoveredExtraFile> {
        self.components.iter().flat_map(|c| &c.extra_files)
    }
}

/// Runs every registered component that has an input
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    components: Vec<Component>,
    options: MigrationOptions,
}

impl Default for MigrationEngine {
    fn default() -> Self {
        Self::new(MigrationOptions::default())
    }
}

impl MigrationEngine {
    /// Create engine with the built-in components
    #[must_use]
    pub fn new(options: MigrationOptions) -> Self {
        Self {
            components: components::builtin(),
            options,
        }
    }

    /// Create engine with no components
    #[must_use]
    pub fn empty(options: MigrationOptions) -> Self {
        Self {
            components: Vec::new(),
            options,
        }
    }

    /// Register a component
    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Registered components
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Run options
    #[must_use]
    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Migrate without any remediation
    ///
    /// # Errors
    /// The first [`MigrationError`](crate::MigrationError) of any component.
    pub fn run(&self, inputs: &InputProcessor) -> MigrationResult<MigrationReport> {
        self.run_with(inputs, &mut HeadlessResolver)
    }

    /// Migrate, offering unresolved items to `resolver` in interactive mode
    ///
    /// Components are migrated in registration order into one values
    /// document. Components without an input are skipped.
    ///
    /// # Errors
    /// The first [`MigrationError`](crate::MigrationError) of any component.
    pub fn run_with<R: Resolver + ?Sized>(
        &self,
        inputs: &InputProcessor,
        resolver: &mut R,
    ) -> MigrationResult<MigrationReport> {
        info!(components = self.components.len(), "starting migration");

        let mut values = Value::Mapping(Mapping::new());
        let mut reports = Vec::new();

        for component in &self.components {
            let Some(input) = inputs.input_for_component(component.root_key()) else {
                debug!(component = component.root_key(), "no input, skipping");
                continue;
            };
            let report = MigrationService::new(component, &self.options).migrate(
                input,
                &mut values,
                resolver,
            )?;
            reports.push(report);
        }

        info!(migrated = reports.len(), "migration completed");
        Ok(MigrationReport {
            values,
            components: reports,
        })
    }
}
