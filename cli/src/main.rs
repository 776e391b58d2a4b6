//! `ess-migrate`: migrate Synapse and MAS configuration to ESS Helm values

mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ess_migration::components::{mas, synapse};
use ess_migration::{
    write_outputs, ConflictPolicy, InputProcessor, MigrationEngine, MigrationOptions,
    MigrationReport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::prompt::TerminalResolver;

/// Migrate an existing Matrix deployment configuration to Element Server Suite
#[derive(Debug, Parser)]
#[command(name = "ess-migrate", version, about)]
struct Cli {
    /// Synapse homeserver.yaml to migrate
    #[arg(long, value_name = "FILE")]
    synapse_config: Option<PathBuf>,

    /// Matrix Authentication Service config.yaml to migrate
    #[arg(long, value_name = "FILE")]
    mas_config: Option<PathBuf>,

    /// Directory receiving values.yaml and the generated manifests
    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Prompt for missing secrets and files instead of failing
    #[arg(long)]
    interactive: bool,

    /// Replace scalars that block a target path instead of failing
    #[arg(long)]
    legacy_overwrite: bool,

    /// Log migration progress
    #[arg(short, long, conflicts_with_all = ["debug", "quiet"])]
    verbose: bool,

    /// Log per-key details
    #[arg(long, conflicts_with = "quiet")]
    debug: bool,

    /// Log errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    fn options(&self) -> MigrationOptions {
        let policy = if self.legacy_overwrite {
            ConflictPolicy::Overwrite
        } else {
            ConflictPolicy::Strict
        };
        MigrationOptions::default()
            .with_interactive(self.interactive)
            .with_conflict_policy(policy)
    }

    fn inputs(&self) -> Result<InputProcessor> {
        let mut inputs = InputProcessor::new();
        if let Some(path) = &self.synapse_config {
            inputs
                .load(synapse::ROOT_KEY, path)
                .with_context(|| format!("invalid Synapse configuration {}", path.display()))?;
        }
        if let Some(path) = &self.mas_config {
            inputs
                .load(mas::ROOT_KEY, path)
                .with_context(|| format!("invalid MAS configuration {}", path.display()))?;
        }
        if inputs.is_empty() {
            bail!("nothing to migrate, pass --synapse-config and/or --mas-config");
        }
        Ok(inputs)
    }
}

fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let inputs = cli.inputs()?;
    let engine = MigrationEngine::new(cli.options());

    let report = engine
        .run_with(&inputs, &mut TerminalResolver::stdio())
        .context("migration failed")?;

    let written = write_outputs(&cli.output_dir, &report)
        .with_context(|| format!("cannot write outputs to {}", cli.output_dir.display()))?;
    info!(files = written.len(), "done");

    print_summary(&report, &written);
    Ok(())
}

fn print_summary(report: &MigrationReport, written: &[PathBuf]) {
    println!("Migrated components:");
    for component in &report.components {
        println!(
            "  {} from {} ({} values, {} secrets, {} files)",
            component.root_key,
            component.source_file,
            component.results.len(),
            component.discovered_secrets.len(),
            component.extra_files.len()
        );
    }

    println!("Written files:");
    for path in written {
        println!("  {}", path.display());
    }

    let init: Vec<&str> = report.init_by_platform().collect();
    if !init.is_empty() {
        println!("Secrets generated by the platform:");
        for key in init {
            println!("  {key}");
        }
    }

    let warnings: Vec<String> = report.override_warnings().map(ToString::to_string).collect();
    if !warnings.is_empty() {
        println!(
            "Settings managed by ESS, review and remove them from the imported configuration:"
        );
        for warning in warnings {
            println!("  {warning}");
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
