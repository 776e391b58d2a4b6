//! Synapse homeserver

use crate::components::uri::hostname_transform;
use crate::secrets::SecretSchemaEntry;
use crate::strategy::{
    Component, ExtraFilesStrategy, MigrationStrategy, OverrideConfigSet, SecretDiscoveryStrategy,
};
use crate::transformer::TransformationSpec;

/// Top-level key of Synapse in the values document
pub const ROOT_KEY: &str = "synapse";

/// Synapse mapping rules
#[derive(Debug, Clone, Copy, Default)]
pub struct SynapseMigration;

impl MigrationStrategy for SynapseMigration {
    fn component_root_key(&self) -> &str {
        ROOT_KEY
    }

    fn override_configs(&self) -> OverrideConfigSet {
        [
            "public_baseurl",
            "server_name",
            "database.args.host",
            "database.args.port",
            "database.args.user",
            "database.args.password",
            "database.args.database",
            "database.args.sslmode",
            "database.args.application_name",
            "database.args.keepalives",
            "database.args.keepalives_idle",
            "database.args.keepalives_interval",
            "database.args.keepalives_count",
            "ip_range_blacklist",
            "signing_key_path",
            "start_pushers",
            "pusher_instances",
            "update_user_directory_from_worker",
            "instance_map",
            "instance_map.main",
            "instance_map.host",
            "instance_map.port",
            "redis",
            "redis.enabled",
            "redis.host",
            "stream_writers",
            "enable_metrics",
            "log_config",
            "macaroon_secret_key_path",
            "registration_shared_secret_path",
            "worker_replication_secret_path",
            "form_secret_path",
            "listeners",
        ]
        .into_iter()
        .collect()
    }

    fn transformations(&self) -> Vec<TransformationSpec> {
        vec![
            TransformationSpec::new("server_name", "serverName"),
            TransformationSpec::new("database.args.host", "synapse.postgres.host"),
            TransformationSpec::optional("database.args.port", "synapse.postgres.port"),
            TransformationSpec::new("database.args.user", "synapse.postgres.user"),
            TransformationSpec::new("database.args.database", "synapse.postgres.database"),
            TransformationSpec::optional("database.args.sslmode", "synapse.postgres.sslMode"),
            TransformationSpec::new("public_baseurl", "synapse.ingress.host")
                .with_transform(hostname_transform),
        ]
    }
}

/// Synapse credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct SynapseSecretDiscovery;

impl SecretDiscoveryStrategy for SynapseSecretDiscovery {
    fn component_name(&self) -> &str {
        "Synapse"
    }

    fn secret_schema(&self) -> Vec<SecretSchemaEntry> {
        vec![
            SecretSchemaEntry::new("synapse.postgres.password", "Synapse database password")
                .inline("database.args.password"),
            // Changing it after migration invalidates every access token.
            SecretSchemaEntry::new("synapse.macaroon", "Synapse macaroon secret")
                .inline("macaroon_secret_key")
                .file_reference("macaroon_secret_key_path"),
            SecretSchemaEntry::new("synapse.registrationSharedSecret", "Registration shared secret")
                .inline("registration_shared_secret")
                .file_reference("registration_shared_secret_path")
                .platform_generated(),
            // Changing it after migration breaks federation.
            SecretSchemaEntry::new("synapse.signingKey", "Signing key")
                .inline("signing_key")
                .file_reference("signing_key_path"),
        ]
    }
}

/// Synapse file references that are runtime locations
#[derive(Debug, Clone, Copy, Default)]
pub struct SynapseExtraFiles;

impl ExtraFilesStrategy for SynapseExtraFiles {
    fn component_name(&self) -> &str {
        "Synapse"
    }

    fn ignored_config_keys(&self) -> Vec<String> {
        ["media_store_path", "uploads_path", "pid_file", "log_file", "log_config"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

/// Synapse with secret and extra-file discovery
#[must_use]
pub fn component() -> Component {
    Component::new(SynapseMigration)
        .with_secrets(SynapseSecretDiscovery)
        .with_extra_files(SynapseExtraFiles)
}
