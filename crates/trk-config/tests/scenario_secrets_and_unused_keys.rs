use trk_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

#[test]
fn literal_secret_value_aborts_load() {
    let yaml = r#"
consumers:
  forward:
    url: "https://lrs.example.org/statements"
    auth_env: "sk-live-0123456789abcdef"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"), "got: {msg}");
    assert!(!msg.contains("0123456789abcdef"), "secret value must be redacted");
}

#[test]
fn env_var_names_resolve_through_lookup() {
    let yaml = r#"
consumers:
  forward:
    url: "https://lrs.example.org/statements"
    auth_env: "TRK_FORWARD_TOKEN"
"#;
    let cfg = load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .collector()
        .unwrap();
    let secrets = cfg
        .resolve_secrets_with(|name| (name == "TRK_FORWARD_TOKEN").then(|| "t0k".to_string()))
        .unwrap();
    assert_eq!(secrets.forward_auth.as_deref(), Some("t0k"));
    assert!(secrets.database_url.is_none());
}

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
server:
  bind_addr: "127.0.0.1:3300"
leftover:
  foo: 1
  bar: 2
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/leftover/bar".to_string(), "/leftover/foo".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
collector:
  boundary_verbs: "typo"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn version_entries_are_consumed_subtrees() {
    let yaml = r#"
directory:
  versions:
    - id: "v1"
      game_id: "g1"
      tracking_code: "code-1"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
    assert_eq!(loaded.collector().unwrap().directory.versions.len(), 1);
}
