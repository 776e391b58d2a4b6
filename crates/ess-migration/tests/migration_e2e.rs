//! Full runs of the built-in components over fixture configurations

use std::fs;

use ess_migration::{
    write_outputs, Component, ConflictPolicy, FileResolution, InputProcessor, MigrationEngine,
    MigrationError, MigrationInput, MigrationOptions, ScriptedResolver, TransformationSpec,
    ValidationError, ADDITIONAL_CONFIG_NAME,
};
use ess_test_utils::{doc, ConfigDir, TestStrategy, SIGNING_KEY, SYNAPSE_HOMESERVER};
use ess_values::{get, Value};
use pretty_assertions::assert_eq;

fn str_at<'a>(values: &'a Value, path: &str) -> Option<&'a str> {
    get(values, path).and_then(Value::as_str)
}

fn imported_config(values: &Value, component: &str) -> Value {
    let text = get(values, &format!("{component}.additional"))
        .and_then(|a| a.get(ADDITIONAL_CONFIG_NAME))
        .and_then(|i| i.get("config"))
        .and_then(Value::as_str)
        .unwrap();
    doc(text)
}

#[test]
fn synapse_and_mas_migrate_headless() {
    let dir = ConfigDir::new();
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", dir.synapse()).unwrap();
    inputs.load("matrixAuthenticationService", dir.mas()).unwrap();

    let report = MigrationEngine::default().run(&inputs).unwrap();
    let values = &report.values;

    assert_eq!(str_at(values, "serverName"), Some("test.example.com"));
    assert_eq!(get(values, "synapse.enabled"), Some(&Value::Bool(true)));
    assert_eq!(str_at(values, "synapse.postgres.host"), Some("postgres"));
    assert_eq!(get(values, "synapse.postgres.port"), Some(&Value::from(5432)));
    assert_eq!(str_at(values, "synapse.ingress.host"), Some("matrix.test.example.com"));
    assert_eq!(
        get(values, "synapse.macaroon"),
        Some(&doc("{secret: imported-synapse, secretKey: synapse.macaroon}"))
    );

    assert_eq!(
        str_at(values, "matrixAuthenticationService.postgres.host"),
        Some("postgres")
    );
    assert_eq!(
        get(values, "matrixAuthenticationService.postgres.port"),
        Some(&Value::from(5432))
    );
    assert_eq!(
        str_at(values, "matrixAuthenticationService.postgres.sslMode"),
        Some("require")
    );
    assert_eq!(
        str_at(values, "matrixAuthenticationService.ingress.host"),
        Some("auth.test.example.com")
    );

    let synapse = report.component("synapse").unwrap();
    let secret_keys: Vec<_> = synapse
        .discovered_secrets
        .iter()
        .map(|s| s.target_secret_key.as_str())
        .collect();
    assert_eq!(
        secret_keys,
        vec!["synapse.postgres.password", "synapse.macaroon", "synapse.signingKey"]
    );
    assert_eq!(synapse.init_by_platform, vec!["synapse.registrationSharedSecret"]);
    let signing_key = synapse
        .discovered_secrets
        .iter()
        .find(|s| s.target_secret_key == "synapse.signingKey")
        .unwrap();
    assert_eq!(signing_key.value, SIGNING_KEY);

    let warnings: Vec<_> = report
        .override_warnings()
        .map(|w| (w.component_root_key.as_str(), w.config_path.as_str()))
        .collect();
    assert_eq!(
        warnings,
        vec![
            ("synapse", "listeners"),
            ("synapse", "log_config"),
            ("matrixAuthenticationService", "http"),
        ]
    );

    let init: Vec<_> = report.init_by_platform().collect();
    assert_eq!(init.len(), 4);
}

#[test]
fn credentials_never_reach_the_imported_config() {
    let dir = ConfigDir::new();
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", dir.synapse()).unwrap();
    inputs.load("matrixAuthenticationService", dir.mas()).unwrap();

    let report = MigrationEngine::default().run(&inputs).unwrap();

    let synapse = imported_config(&report.values, "synapse");
    assert_eq!(get(&synapse, "database.args.password"), None);
    assert_eq!(get(&synapse, "macaroon_secret_key"), None);
    assert_eq!(get(&synapse, "signing_key_path"), None);
    assert_eq!(str_at(&synapse, "max_upload_size"), Some("50M"));
    assert_eq!(str_at(&synapse, "media_store_path"), Some("/data/media_store"));

    let mas = imported_config(&report.values, "matrixAuthenticationService");
    assert_eq!(get(&mas, "database.uri"), None);
    assert_eq!(get(&mas, "matrix.secret"), None);
    assert_eq!(str_at(&mas, "matrix.homeserver"), Some("test.example.com"));
}

#[test]
fn extra_files_are_mounted_and_references_rewritten() {
    let dir = ConfigDir::new();
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", dir.synapse()).unwrap();

    let report = MigrationEngine::default().run(&inputs).unwrap();

    let names: Vec<_> = report.extra_files().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["telegram.yaml", "whatsapp.yaml"]);

    let synapse = imported_config(&report.values, "synapse");
    assert_eq!(
        get(&synapse, "app_service_config_files"),
        Some(&doc(
            "[/etc/synapse/extra/telegram.yaml, /etc/synapse/extra/whatsapp.yaml]"
        ))
    );
    assert_eq!(
        get(&report.values, "synapse.extraVolumes"),
        Some(&doc("[{name: imported-synapse, configMap: {name: imported-synapse}}]"))
    );
    assert_eq!(
        get(&report.values, "synapse.extraVolumeMounts.0"),
        Some(&doc(
            "{name: imported-synapse, mountPath: /etc/synapse/extra/telegram.yaml, subPath: telegram.yaml, readOnly: true}"
        ))
    );

    let config_map = report.component("synapse").unwrap().config_map.as_ref().unwrap();
    assert_eq!(config_map.data["telegram.yaml"], "id: telegram\n");
    assert!(config_map.binary_data.is_empty());
}

#[test]
fn outputs_are_written_per_component() {
    let dir = ConfigDir::new();
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", dir.synapse()).unwrap();
    inputs.load("matrixAuthenticationService", dir.mas()).unwrap();
    let report = MigrationEngine::default().run(&inputs).unwrap();

    let out = dir.path().join("out");
    let written = write_outputs(&out, &report).unwrap();

    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "values.yaml",
            "synapse-secret.yaml",
            "synapse-configmap.yaml",
            "matrix-authentication-service-secret.yaml",
        ]
    );

    let values: Value = doc(&fs::read_to_string(out.join("values.yaml")).unwrap());
    assert_eq!(values, report.values);

    let secret = doc(&fs::read_to_string(out.join("synapse-secret.yaml")).unwrap());
    assert_eq!(str_at(&secret, "kind"), Some("Secret"));
    assert_eq!(str_at(&secret, "metadata.name"), Some("imported-synapse"));
    let data = get(&secret, "data").and_then(Value::as_mapping).unwrap();
    assert_eq!(
        data.get("synapse.macaroon").and_then(Value::as_str),
        Some("bWFjYXJvb24tc2VjcmV0")
    );
}

#[test]
fn missing_required_secret_fails_headless_and_resolves_interactively() {
    let dir = ConfigDir::new();
    let without_macaroon = SYNAPSE_HOMESERVER.replace("macaroon_secret_key: macaroon-secret\n", "");
    dir.synapse();
    let path = dir.write_config("homeserver.yaml", &without_macaroon);
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", &path).unwrap();

    let err = MigrationEngine::default().run(&inputs).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::MissingRequiredSecrets { ref keys, .. }
            if keys == &["synapse.macaroon".to_string()]
    ));

    let engine = MigrationEngine::new(MigrationOptions::default().with_interactive(true));
    let mut resolver = ScriptedResolver::new().with_secret("synapse.macaroon", "typed-in");
    let report = engine.run_with(&inputs, &mut resolver).unwrap();
    let secret = report
        .discovered_secrets()
        .find(|s| s.target_secret_key == "synapse.macaroon")
        .unwrap();
    assert_eq!(secret.value, "typed-in");
}

#[test]
fn resolver_is_ignored_unless_interactive() {
    let dir = ConfigDir::new();
    let template =
        format!("{SYNAPSE_HOMESERVER}federation_custom_ca_list:\n  - /nonexistent/ca.pem\n");
    dir.synapse();
    dir.write("certs/ca.pem", "ca");
    let path = dir.write_config("homeserver.yaml", &template);
    let mut inputs = InputProcessor::new();
    inputs.load("synapse", &path).unwrap();
    let mut resolver = ScriptedResolver::new().with_file(
        "federation_custom_ca_list.0",
        FileResolution::SearchDirectory(dir.path().join("certs")),
    );

    let err = MigrationEngine::default()
        .run_with(&inputs, &mut resolver)
        .unwrap_err();
    assert!(matches!(err, MigrationError::MissingExtraFiles { ref paths } if paths.len() == 1));

    let report = MigrationEngine::new(MigrationOptions::default().with_interactive(true))
        .run_with(&inputs, &mut resolver)
        .unwrap();
    let synapse = imported_config(&report.values, "synapse");
    assert_eq!(
        str_at(&synapse, "federation_custom_ca_list.0"),
        Some("/etc/synapse/extra/ca.pem")
    );
}

#[test]
fn conflicting_targets_need_legacy_overwrite() {
    let strategy = TestStrategy::new("web")
        .with_spec(TransformationSpec::new("theme", "web.config"))
        .with_spec(TransformationSpec::new("brand", "web.config.brand"));
    let mut inputs = InputProcessor::new();
    inputs.push(MigrationInput {
        name: "web".into(),
        config_path: "config.yaml".into(),
        config: doc("theme: dark\nbrand: Element\n"),
    });

    let strict = MigrationEngine::empty(MigrationOptions::default())
        .with_component(Component::new(strategy.clone()))
        .run(&inputs)
        .unwrap_err();
    assert!(matches!(
        strict,
        MigrationError::PathConflict { ref target, .. } if target == "web.config.brand"
    ));

    let options = MigrationOptions::default().with_conflict_policy(ConflictPolicy::Overwrite);
    let report = MigrationEngine::empty(options)
        .with_component(Component::new(strategy))
        .run(&inputs)
        .unwrap();
    assert_eq!(get(&report.values, "web.config"), Some(&doc("{brand: Element}")));
}

#[test]
fn invalid_inputs_fail_before_migration() {
    let dir = ConfigDir::new();
    let empty = dir.write("empty.yaml", "");
    let list = dir.write("list.yaml", "- a\n");
    let mut inputs = InputProcessor::new();

    assert!(matches!(inputs.load("synapse", &empty), Err(ValidationError::Empty(_))));
    assert!(matches!(
        inputs.load("synapse", &list),
        Err(ValidationError::NotAMapping { .. })
    ));
    assert!(matches!(
        inputs.load("synapse", dir.path().join("absent.yaml")),
        Err(ValidationError::NotFound(_))
    ));
    assert!(inputs.is_empty());
}
