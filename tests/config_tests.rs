//! Tests for configuration loading
//!
//! YAML files are written to temporary directories; environment overrides are
//! fed through `apply_env_with` so tests never touch the process environment.

use brrtbind::config::BindConfig;
use brrtbind::error::ConfigError;
use std::collections::HashMap;
use std::io::Write;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_file_with_partial_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bind.yaml");
    std::fs::write(&path, "square_brackets: false\nauth_backends: [token]\n").unwrap();

    let config = BindConfig::from_file(&path).unwrap();
    assert!(!config.square_brackets);
    assert_eq!(config.auth_backends, vec!["token"]);
    assert!(config.validate_output);
    assert_eq!(config.token_validity_days, 4);
}

#[test]
fn test_empty_file_gives_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file).unwrap();
    let config = BindConfig::from_file(file.path()).unwrap();
    assert_eq!(config, BindConfig::default());
}

#[test]
fn test_unknown_key_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "validate_outputs: false").unwrap();
    let err = BindConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigYaml(_)));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BindConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
    match err {
        ConfigError::ConfigIo { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_environment_overrides_file_values() {
    let mut config = BindConfig::from_yaml_str("validate_output: true\ntoken_validity_days: 10").unwrap();
    config.apply_env_with(env(&[
        ("BRRTB_VALIDATE_OUTPUT", "off"),
        ("BRRTB_AUTH_BACKENDS", " token , session ,"),
        ("BRRTB_TOKEN_VALIDITY_DAYS", "30"),
    ]));
    assert!(!config.validate_output);
    assert_eq!(config.auth_backends, vec!["token", "session"]);
    assert_eq!(config.token_validity_days, 30);
}

#[test]
fn test_invalid_environment_values_ignored() {
    let mut config = BindConfig::default();
    config.apply_env_with(env(&[
        ("BRRTB_SQUARE_BRACKETS", "maybe"),
        ("BRRTB_TOKEN_VALIDITY_DAYS", "-3"),
    ]));
    assert_eq!(config, BindConfig::default());
}
