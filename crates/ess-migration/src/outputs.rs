//! Output generation
//!
//! Produces the Helm values document and the Kubernetes Secret and
//! ConfigMap manifests that carry imported credentials and files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ess_values::{to_yaml, Value};
use serde::Serialize;
use tracing::info;

use crate::engine::MigrationReport;
use crate::error::{MigrationError, MigrationResult};
use crate::extra_files::DiscoveredExtraFile;
use crate::mounts::MountPlan;
use crate::secrets::DiscoveredSecret;

/// Convert a camelCase key to kebab-case
///
/// `matrixAuthenticationService` becomes `matrix-authentication-service`.
#[must_use]
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Name of the Secret and ConfigMap generated for a component
#[must_use]
pub fn resource_name(component_root_key: &str) -> String {
    format!("imported-{}", kebab_case(component_root_key))
}

/// Kubernetes object metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    /// Object name
    pub name: String,

    /// Namespace, when not the default one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Kubernetes `Secret` with base64 data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretManifest {
    /// Always `v1`
    pub api_version: &'static str,

    /// Always `Secret`
    pub kind: &'static str,

    /// Object metadata
    pub metadata: ObjectMeta,

    /// Base64-encoded values keyed by target secret key
    pub data: BTreeMap<String, String>,
}

impl SecretManifest {
    /// Build the Secret for a component, if it has any secrets
    #[must_use]
    pub fn from_secrets(component_root_key: &str, secrets: &[DiscoveredSecret]) -> Option<Self> {
        if secrets.is_empty() {
            return None;
        }
        Some(Self {
            api_version: "v1",
            kind: "Secret",
            metadata: ObjectMeta {
                name: resource_name(component_root_key),
                namespace: None,
            },
            data: secrets
                .iter()
                .map(|s| (s.target_secret_key.clone(), STANDARD.encode(s.value.as_bytes())))
                .collect(),
        })
    }
}

/// Kubernetes `ConfigMap` holding imported files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapManifest {
    /// Always `v1`
    pub api_version: &'static str,

    /// Always `ConfigMap`
    pub kind: &'static str,

    /// Object metadata
    pub metadata: ObjectMeta,

    /// Text files
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    /// Binary files, base64-encoded
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, String>,
}

impl ConfigMapManifest {
    /// Build the ConfigMap for planned files, if there are any
    ///
    /// Cleartext files that are not valid UTF-8 go to `binaryData`.
    #[must_use]
    pub fn from_files(plan: &MountPlan, files: &[DiscoveredExtraFile]) -> Option<Self> {
        if plan.is_empty() {
            return None;
        }
        let mut data = BTreeMap::new();
        let mut binary_data = BTreeMap::new();
        for (key, file) in plan.keys.iter().zip(files) {
            match (file.cleartext, std::str::from_utf8(&file.content)) {
                (true, Ok(text)) => {
                    data.insert(key.clone(), text.to_string());
                }
                _ => {
                    binary_data.insert(key.clone(), STANDARD.encode(&file.content));
                }
            }
        }
        Some(Self {
            api_version: "v1",
            kind: "ConfigMap",
            metadata: ObjectMeta {
                name: plan.volume_name.clone(),
                namespace: None,
            },
            data,
            binary_data,
        })
    }
}

/// Render the values document as Helm `values.yaml` content
///
/// # Errors
/// Fails when the document cannot be rendered.
pub fn generate_helm_values(values: &Value) -> MigrationResult<String> {
    Ok(to_yaml(values)?)
}

fn write_file(path: PathBuf, content: &str) -> MigrationResult<PathBuf> {
    std::fs::write(&path, content).map_err(|err| MigrationError::io_error(&path, err))?;
    info!(path = %path.display(), "wrote output");
    Ok(path)
}

/// Write every migration output into `output_dir`
///
/// Creates `values.yaml`, plus `<component>-secret.yaml` and
/// `<component>-configmap.yaml` for components that have them. Returns
/// the written paths.
///
/// # Errors
/// Fails when the directory cannot be created or a file cannot be written.
pub fn write_outputs(output_dir: &Path, report: &MigrationReport) -> MigrationResult<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|err| MigrationError::io_error(output_dir, err))?;

    let mut written = vec![write_file(
        output_dir.join("values.yaml"),
        &generate_helm_values(&report.values)?,
    )?];

    for component in &report.components {
        let name = kebab_case(&component.root_key);
        if let Some(secret) = &component.secret {
            written.push(write_file(
                output_dir.join(format!("{name}-secret.yaml")),
                &to_yaml(secret)?,
            )?);
        }
        if let Some(config_map) = &component.config_map {
            written.push(write_file(
                output_dir.join(format!("{name}-configmap.yaml")),
                &to_yaml(config_map)?,
            )?);
        }
    }

    info!(dir = %output_dir.display(), files = written.len(), "migration outputs written");
    Ok(written)
}
