//! Mounting imported extra files into a component
//!
//! Imported files travel in one ConfigMap per component and are mounted
//! one by one with `subPath`. References in the residual configuration are
//! rewritten to the mounted location so the migrated service finds them.
//! Files reached through a directory reference are mounted under that
//! directory's name and the reference points at the mounted directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use ess_values::{get, set_with, ConflictPolicy, Mapping, Value};
use tracing::{debug, info};

use crate::error::{MigrationError, MigrationResult};
use crate::extra_files::DiscoveredExtraFile;
use crate::outputs::resource_name;

/// One file mounted from the component ConfigMap
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VolumeMount {
    /// Absolute path inside the container
    pub mount_path: String,

    /// ConfigMap key mounted at that path
    pub sub_path: String,
}

/// A config value replaced by its mounted location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRewrite {
    /// Dotted path in the source document
    pub config_key: String,

    /// Mounted location
    pub value: String,
}

/// How a component's extra files are mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    /// Name of the ConfigMap and of its volume
    pub volume_name: String,

    /// ConfigMap key of each file, aligned with the planned files
    pub keys: Vec<String>,

    /// Mounts sorted by mount path
    pub mounts: Vec<VolumeMount>,

    /// Config values to rewrite
    pub rewrites: Vec<ConfigRewrite>,
}

/// Make a file name usable as a ConfigMap key
fn configmap_key(filename: &str) -> String {
    let key: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "file".to_string()
    } else {
        key
    }
}

/// Reserve `base` in `used`, prefixing `2-`, `3-`, ... until it is free
fn claim(used: &mut BTreeSet<String>, base: &str) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{n}-{base}");
        n += 1;
    }
    name
}

/// Plan mounts for `files` under `mount_dir`
///
/// ConfigMap keys and directory mount names share one namespace under
/// `mount_dir`, so two source directories with the same name are mounted
/// side by side (`templates`, `2-templates`).
///
/// # Errors
/// [`MigrationError::MountCollision`] when two different ConfigMap keys
/// would be mounted at the same path.
pub fn plan_mounts(
    component_root_key: &str,
    mount_dir: &str,
    files: &[DiscoveredExtraFile],
) -> MigrationResult<MountPlan> {
    let mount_dir = mount_dir.trim_end_matches('/');
    let mut used = BTreeSet::new();
    let mut directories: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut keys = Vec::with_capacity(files.len());
    let mut mounts = BTreeSet::new();
    let mut rewrites: BTreeMap<String, String> = BTreeMap::new();

    for file in files {
        let key = claim(&mut used, &configmap_key(&file.filename));

        for reference in &file.discovered_source_paths {
            let (mount_path, value) = if reference.is_directory {
                let name = directories
                    .entry(reference.source_path.clone())
                    .or_insert_with(|| {
                        let base = reference.source_path.file_name().map_or_else(
                            || "files".to_string(),
                            |n| configmap_key(&n.to_string_lossy()),
                        );
                        claim(&mut used, &base)
                    });
                let dir = format!("{mount_dir}/{name}");
                (format!("{dir}/{}", file.filename), dir)
            } else {
                let path = format!("{mount_dir}/{key}");
                (path.clone(), path)
            };
            mounts.insert(VolumeMount {
                mount_path,
                sub_path: key.clone(),
            });
            rewrites.entry(reference.config_key.clone()).or_insert(value);
        }
        keys.push(key);
    }

    let mut by_path: BTreeMap<&str, &str> = BTreeMap::new();
    for mount in &mounts {
        if let Some(other) = by_path.insert(&mount.mount_path, &mount.sub_path) {
            return Err(MigrationError::MountCollision {
                mount_path: mount.mount_path.clone(),
                keys: vec![other.to_string(), mount.sub_path.clone()],
            });
        }
    }

    Ok(MountPlan {
        volume_name: resource_name(component_root_key),
        keys,
        mounts: mounts.into_iter().collect(),
        rewrites: rewrites
            .into_iter()
            .map(|(config_key, value)| ConfigRewrite { config_key, value })
            .collect(),
    })
}

impl MountPlan {
    /// Check whether there is nothing to mount
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Point file references in `config` at their mounted locations
    ///
    /// Keys no longer present in `config` are left alone.
    ///
    /// # Errors
    /// [`MigrationError::PathConflict`] when a rewrite is blocked.
    pub fn rewrite_references(
        &self,
        config: &mut Value,
        policy: ConflictPolicy,
    ) -> MigrationResult<()> {
        for rewrite in &self.rewrites {
            let Some(original) = get(config, &rewrite.config_key).cloned() else {
                debug!(key = %rewrite.config_key, "reference consumed, not rewritten");
                continue;
            };
            let value = Value::String(rewrite.value.clone());
            set_with(config, &rewrite.config_key, value, policy).map_err(|source| {
                MigrationError::PathConflict {
                    target: rewrite.config_key.clone(),
                    source,
                }
            })?;
            info!(
                key = %rewrite.config_key,
                from = original.as_str().unwrap_or_default(),
                to = %rewrite.value,
                "updated file reference"
            );
        }
        Ok(())
    }

    /// Add `extraVolumes` and `extraVolumeMounts` to the component
    ///
    /// # Errors
    /// [`MigrationError::PathConflict`] when the component node is blocked.
    pub fn attach(
        &self,
        component_root_key: &str,
        target: &mut Value,
        policy: ConflictPolicy,
    ) -> MigrationResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut config_map = Mapping::new();
        config_map.insert("name".into(), self.volume_name.as_str().into());
        let mut volume = Mapping::new();
        volume.insert("name".into(), self.volume_name.as_str().into());
        volume.insert("configMap".into(), Value::Mapping(config_map));

        let mounts = self
            .mounts
            .iter()
            .map(|m| {
                let mut mount = Mapping::new();
                mount.insert("name".into(), self.volume_name.as_str().into());
                mount.insert("mountPath".into(), m.mount_path.as_str().into());
                mount.insert("subPath".into(), m.sub_path.as_str().into());
                mount.insert("readOnly".into(), true.into());
                Value::Mapping(mount)
            })
            .collect();

        for (key, value) in [
            ("extraVolumes", Value::Sequence(vec![Value::Mapping(volume)])),
            ("extraVolumeMounts", Value::Sequence(mounts)),
        ] {
            let path = format!("{component_root_key}.{key}");
            set_with(target, &path, value, policy).map_err(|source| MigrationError::PathConflict {
                target: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
