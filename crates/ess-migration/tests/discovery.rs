//! Secret and extra-file discovery against files on disk

use ess_migration::{
    discover_extra_files, discover_secrets, is_binary, FileResolution, MigrationError,
    ScriptedResolver, SecretSchemaEntry, BINARY_SNIFF_LEN,
};
use ess_test_utils::{doc, ConfigDir, TestExtraFiles, TestSecrets};
use pretty_assertions::assert_eq;

#[test]
fn inline_secret_wins_over_file_reference() {
    let dir = ConfigDir::new();
    let key_file = dir.write("macaroon.key", "from-file");
    let source = doc(&format!(
        "macaroon_secret_key: inline-value\nmacaroon_secret_key_path: {}\n",
        key_file.display()
    ));
    let schema = TestSecrets(vec![SecretSchemaEntry::new("synapse.macaroon", "Macaroon")
        .inline("macaroon_secret_key")
        .file_reference("macaroon_secret_key_path")]);

    let outcome = discover_secrets(&schema, &source, "homeserver.yaml").unwrap();

    let secret = outcome.get("synapse.macaroon").unwrap();
    assert_eq!(secret.value, "inline-value");
    assert_eq!(secret.source_config_path.as_deref(), Some("macaroon_secret_key"));
}

#[test]
fn file_reference_is_read_when_inline_is_absent() {
    let dir = ConfigDir::new();
    let key_file = dir.write("signing.key", "ed25519 a_key abc\n");
    let source = doc(&format!("signing_key_path: {}\n", key_file.display()));
    let schema = TestSecrets(vec![SecretSchemaEntry::new("synapse.signingKey", "Signing key")
        .inline("signing_key")
        .file_reference("signing_key_path")]);

    let outcome = discover_secrets(&schema, &source, "homeserver.yaml").unwrap();

    let secret = outcome.get("synapse.signingKey").unwrap();
    assert_eq!(secret.value, "ed25519 a_key abc\n");
    assert_eq!(secret.source_config_path.as_deref(), Some("signing_key_path"));
    outcome.validate().unwrap();
}

#[test]
fn platform_generated_and_required_secrets_are_classified() {
    let schema = TestSecrets(vec![
        SecretSchemaEntry::new("synapse.signingKey", "Signing key")
            .inline("signing_key")
            .platform_generated(),
        SecretSchemaEntry::new("synapse.macaroon", "Macaroon").inline("macaroon_secret_key"),
    ]);

    let outcome = discover_secrets(&schema, &doc("server_name: x\n"), "homeserver.yaml").unwrap();

    assert_eq!(outcome.init_by_platform, vec!["synapse.signingKey"]);
    assert_eq!(outcome.missing.len(), 1);
    match outcome.validate().unwrap_err() {
        MigrationError::MissingRequiredSecrets { keys, .. } => {
            assert_eq!(keys, vec!["synapse.macaroon"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_secret_file_is_not_fatal_and_can_be_supplied() {
    let schema = TestSecrets(vec![SecretSchemaEntry::new("synapse.macaroon", "Macaroon")
        .inline("macaroon_secret_key")
        .file_reference("macaroon_secret_key_path")]);
    let source = doc("macaroon_secret_key_path: /nonexistent/macaroon.key\n");

    let mut outcome = discover_secrets(&schema, &source, "homeserver.yaml").unwrap();
    assert!(outcome.validate().is_err());

    outcome
        .resolve_with(&mut ScriptedResolver::new().with_secret("synapse.macaroon", "typed-in"))
        .unwrap();
    outcome.validate().unwrap();
    let secret = outcome.get("synapse.macaroon").unwrap();
    assert_eq!(secret.value, "typed-in");
    assert_eq!(secret.source_config_path.as_deref(), Some("macaroon_secret_key_path"));
}

#[test]
fn failing_secret_transform_leaves_secret_undiscovered() {
    let schema = TestSecrets(vec![SecretSchemaEntry::new("mas.password", "Password")
        .inline("database.uri")
        .with_transform(|raw| {
            Err(ess_migration::TransformError::invalid_value(raw, "not a URI"))
        })
        .platform_generated()]);

    let source = doc("database: {uri: nonsense}\n");
    let outcome = discover_secrets(&schema, &source, "mas.yaml").unwrap();

    assert!(outcome.discovered.is_empty());
    assert_eq!(outcome.init_by_platform, vec!["mas.password"]);
}

#[test]
fn binary_detection_boundary() {
    let mut inside = vec![b'a'; BINARY_SNIFF_LEN + 10];
    inside[BINARY_SNIFF_LEN - 1] = 0;
    assert!(is_binary(&inside));

    let mut outside = vec![b'a'; BINARY_SNIFF_LEN + 10];
    outside[BINARY_SNIFF_LEN] = 0;
    assert!(!is_binary(&outside));

    let dir = ConfigDir::new();
    let text = dir.write_bytes("outside.dat", &outside);
    let binary = dir.write_bytes("inside.dat", &inside);
    let source = doc(&format!("a: {}\nb: {}\n", text.display(), binary.display()));

    let outcome =
        discover_extra_files(&TestExtraFiles::default(), None, &source, "homeserver.yaml").unwrap();

    let classified: Vec<_> = outcome
        .files()
        .map(|f| (f.filename.as_str(), f.cleartext))
        .collect();
    assert_eq!(classified, vec![("inside.dat", false), ("outside.dat", true)]);
}

#[test]
fn three_references_to_one_file_are_deduplicated() {
    let dir = ConfigDir::new();
    dir.write("ca.pem", "-----BEGIN CERTIFICATE-----\n");
    dir.write("sub/placeholder", "");
    let root = dir.path().display();
    let source = doc(&format!(
        "federation_custom_ca_list:\n  - {root}/ca.pem\n  - {root}/./ca.pem\n  - {root}/sub/../ca.pem\n"
    ));

    let outcome =
        discover_extra_files(&TestExtraFiles::default(), None, &source, "homeserver.yaml").unwrap();

    assert_eq!(outcome.file_count(), 1);
    let file = outcome.files().next().unwrap();
    assert_eq!(file.filename, "ca.pem");
    let keys: Vec<_> = file
        .discovered_source_paths
        .iter()
        .map(|p| p.config_key.as_str())
        .collect();
    assert_eq!(
        keys,
        vec![
            "federation_custom_ca_list.0",
            "federation_custom_ca_list.1",
            "federation_custom_ca_list.2"
        ]
    );
}

#[test]
fn directory_reference_imports_immediate_files_only() {
    let dir = ConfigDir::new();
    dir.write("templates/a.html", "<p>a</p>");
    dir.write("templates/b.html", "<p>b</p>");
    dir.write("templates/nested/c.html", "<p>c</p>");
    let source = doc(&format!(
        "templates:\n  custom_template_directory: {}/templates\n",
        dir.path().display()
    ));

    let outcome =
        discover_extra_files(&TestExtraFiles::default(), None, &source, "homeserver.yaml").unwrap();

    let names: Vec<_> = outcome.files().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["a.html", "b.html"]);
    assert!(outcome.discovered_paths()[0].is_directory);
    outcome.validate().unwrap();
}

#[test]
fn secret_and_ignored_keys_are_skipped() {
    let schema = TestSecrets(vec![SecretSchemaEntry::new("synapse.signingKey", "Signing key")
        .file_reference("signing_key_path")]);
    let ignored = TestExtraFiles(vec!["media_store_path".into()]);
    let source = doc(
        "signing_key_path: /nonexistent/signing.key\nmedia_store_path: /data/media\nweb_client_location: https://app.example.com\n",
    );

    let outcome =
        discover_extra_files(&ignored, Some(&schema), &source, "homeserver.yaml").unwrap();

    assert_eq!(outcome.discovered_paths().len(), 2);
    assert!(outcome.discovered_paths().iter().all(|p| p.is_skipped()));
    assert!(outcome.missing().is_empty());
    outcome.validate().unwrap();
}

#[test]
fn missing_files_are_reported_together() {
    let source = doc("a: /nonexistent/one.pem\nb: /nonexistent/two.pem\n");
    let outcome =
        discover_extra_files(&TestExtraFiles::default(), None, &source, "homeserver.yaml").unwrap();

    match outcome.validate().unwrap_err() {
        MigrationError::MissingExtraFiles { paths } => {
            let keys: Vec<_> = paths.iter().map(|p| p.config_key.as_str()).collect();
            assert_eq!(keys, vec!["a", "b"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn remediation_resolves_skips_and_searches() {
    let dir = ConfigDir::new();
    let alternative = dir.write("elsewhere/one.pem", "one");
    dir.write("search/two.pem", "two");
    let source = doc(
        "a: /nonexistent/one.pem\nb: /nonexistent/two.pem\nc: /nonexistent/three.pem\nd: /nonexistent/four.pem\n",
    );
    let mut outcome =
        discover_extra_files(&TestExtraFiles::default(), None, &source, "homeserver.yaml").unwrap();
    assert_eq!(outcome.missing().len(), 4);

    let mut resolver = ScriptedResolver::new()
        .with_file("a", FileResolution::Alternative(alternative))
        .with_file("b", FileResolution::SearchDirectory(dir.path().join("search")))
        .with_file("c", FileResolution::Skip);
    outcome.resolve_with(&mut resolver).unwrap();

    let names: Vec<_> = outcome.files().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["one.pem", "two.pem"]);
    let missing: Vec<_> = outcome.missing().iter().map(|p| p.config_key.clone()).collect();
    assert_eq!(missing, vec!["d"]);
    assert!(outcome.discovered_paths()[2].is_skipped());
}
