//! Matrix Authentication Service
//!
//! MAS keeps its database settings in a single `database.uri`. Every
//! postgres field of the target is derived from that URI, so the URI is
//! read by several mappings.

use ess_values::Value;

use crate::components::uri::{expect_str, hostname_transform, PostgresUri};
use crate::error::TransformError;
use crate::secrets::SecretSchemaEntry;
use crate::strategy::{
    Component, ExtraFilesStrategy, MigrationStrategy, OverrideConfigSet, SecretDiscoveryStrategy,
};
use crate::transformer::TransformationSpec;

/// Top-level key of MAS in the values document
pub const ROOT_KEY: &str = "matrixAuthenticationService";

const DATABASE_URI: &str = "database.uri";

fn postgres_field(
    extract: fn(PostgresUri) -> Option<Value>,
) -> impl Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static {
    move |value| {
        let uri: PostgresUri = expect_str(value)?.parse()?;
        Ok(extract(uri).unwrap_or(Value::Null))
    }
}

/// MAS mapping rules
#[derive(Debug, Clone, Copy, Default)]
pub struct MasMigration;

impl MigrationStrategy for MasMigration {
    fn component_root_key(&self) -> &str {
        ROOT_KEY
    }

    fn override_configs(&self) -> OverrideConfigSet {
        ["http", DATABASE_URI, "encryption", "token"].into_iter().collect()
    }

    fn transformations(&self) -> Vec<TransformationSpec> {
        vec![
            TransformationSpec::new(DATABASE_URI, "matrixAuthenticationService.postgres.host")
                .with_transform(postgres_field(|uri| uri.host.map(Value::String))),
            TransformationSpec::optional(DATABASE_URI, "matrixAuthenticationService.postgres.port")
                .with_transform(postgres_field(|uri| uri.port.map(Value::from))),
            TransformationSpec::new(DATABASE_URI, "matrixAuthenticationService.postgres.user")
                .with_transform(postgres_field(|uri| uri.user.map(Value::String))),
            TransformationSpec::new(DATABASE_URI, "matrixAuthenticationService.postgres.database")
                .with_transform(postgres_field(|uri| uri.database.map(Value::String))),
            TransformationSpec::optional(
                DATABASE_URI,
                "matrixAuthenticationService.postgres.sslMode",
            )
            .with_transform(postgres_field(|uri| uri.ssl_mode.map(Value::String))),
            TransformationSpec::new("http.public_base", "matrixAuthenticationService.ingress.host")
                .with_transform(hostname_transform),
        ]
    }
}

/// MAS credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct MasSecretDiscovery;

impl SecretDiscoveryStrategy for MasSecretDiscovery {
    fn component_name(&self) -> &str {
        "Matrix Authentication Service"
    }

    fn secret_schema(&self) -> Vec<SecretSchemaEntry> {
        vec![
            SecretSchemaEntry::new(
                "matrixAuthenticationService.postgres.password",
                "MAS database password",
            )
            .inline(DATABASE_URI)
            .with_transform(|uri| Ok(uri.parse::<PostgresUri>()?.password))
            .platform_generated(),
            SecretSchemaEntry::new(
                "matrixAuthenticationService.synapseSharedSecret",
                "MAS Synapse shared secret",
            )
            .inline("matrix.secret")
            .file_reference("matrix.secret_file")
            .platform_generated(),
            SecretSchemaEntry::new(
                "matrixAuthenticationService.encryptionSecret",
                "MAS encryption secret",
            )
            .inline("secrets.encryption")
            .file_reference("secrets.encryption_file")
            .platform_generated(),
            SecretSchemaEntry::new(
                "matrixAuthenticationService.privateKeys.rsa",
                "MAS RSA private key",
            )
            .platform_generated(),
            SecretSchemaEntry::new(
                "matrixAuthenticationService.privateKeys.ecdsaPrime256v1",
                "MAS ECDSA private key",
            )
            .platform_generated(),
        ]
    }
}

/// MAS file references
#[derive(Debug, Clone, Copy, Default)]
pub struct MasExtraFiles;

impl ExtraFilesStrategy for MasExtraFiles {
    fn component_name(&self) -> &str {
        "Matrix Authentication Service"
    }

    fn ignored_config_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// MAS with secret and extra-file discovery
#[must_use]
pub fn component() -> Component {
    Component::new(MasMigration)
        .with_secrets(MasSecretDiscovery)
        .with_extra_files(MasExtraFiles)
}
