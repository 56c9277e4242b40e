//! Provisioning config loading and error-message tests.

use std::fs;

use pantry_core::{ConfigError, LogLevel, ProvisionConfig};

#[test]
fn load_resolves_relative_sources_against_config_dir() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("pantry.yml");
    fs::write(
        &path,
        "roles_path: my_roles\n\
         encrypted_data_bag_secret_key_path: keys/secret\n\
         run_list: [\"recipe[web]\"]\n\
         attributes:\n  web:\n    port: 8080\n\
         pantry_port: 9999\n\
         log_level: debug\n",
    )
    .expect("write");

    let config = ProvisionConfig::load(&path).expect("load");
    assert_eq!(config.roles_path, Some(dir.path().join("my_roles")));
    assert_eq!(
        config.encrypted_data_bag_secret_key_path,
        Some(dir.path().join("keys").join("secret"))
    );
    assert_eq!(config.data_bags_path, Some(dir.path().join("data_bags")));
    assert_eq!(config.run_list, vec!["recipe[web]".to_string()]);
    assert_eq!(config.attributes["web"]["port"], 8080);
    assert_eq!(config.pantry_port, 9999);
    assert_eq!(config.log_level, LogLevel::Debug);
}

#[test]
fn load_missing_file_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.yml");
    let err = ProvisionConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.yml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("pantry.yml");
    fs::write(&path, b"pantry_port: [not, a, number]\n").expect("write");

    let err = ProvisionConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("pantry.yml"));
}

#[test]
fn empty_document_yields_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("pantry.yml");
    fs::write(&path, b"{}\n").expect("write");

    let config = ProvisionConfig::load(&path).expect("load");
    assert_eq!(config.pantry_port, 12358);
    assert_eq!(config.root_path, "/tmp/kitchen");
    assert_eq!(config.cookbooks_path, Some(dir.path().join("cookbooks")));
    assert_eq!(config.chef_client_path, None::<String>);
}
