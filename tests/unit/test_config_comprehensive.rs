use foreman::core::config::{
    ConfigLoader, ConfigValidator, ForemanConfig, MIN_REJECTION_REASON_CHARS,
};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = ForemanConfig::default();
    assert_eq!(
        config.validation.min_rejection_reason_chars,
        MIN_REJECTION_REASON_CHARS
    );
    assert!(config.pool.notify_dropped_claims);
    assert_eq!(config.logging.filter, "info");
    assert!(!config.logging.json);
}

#[test]
#[serial]
fn test_missing_file_returns_none() {
    let dir = TempDir::new().unwrap();
    let loaded = ConfigLoader::load_from_file(&dir.path().join("foreman.toml")).unwrap();
    assert!(loaded.is_none());
}

#[test]
#[serial]
fn test_load_from_workspace_reads_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("foreman.toml"),
        r#"
[validation]
min_rejection_reason_chars = 30

[pool]
notify_dropped_claims = false

[logging]
filter = "debug"
json = true
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    assert_eq!(config.validation.min_rejection_reason_chars, 30);
    assert!(!config.pool.notify_dropped_claims);
    assert_eq!(config.logging.filter, "debug");
    assert!(config.logging.json);
}

#[test]
#[serial]
fn test_missing_workspace_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    assert_eq!(
        config.validation.min_rejection_reason_chars,
        MIN_REJECTION_REASON_CHARS
    );
}

#[test]
#[serial]
fn test_env_overrides_beat_the_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("foreman.toml"),
        r#"
[validation]
min_rejection_reason_chars = 25
"#,
    )
    .unwrap();

    std::env::set_var("FOREMAN_MIN_REJECTION_REASON_CHARS", "50");
    std::env::set_var("FOREMAN_NOTIFY_DROPPED_CLAIMS", "false");
    std::env::set_var("FOREMAN_LOG_FILTER", "warn");

    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();

    std::env::remove_var("FOREMAN_MIN_REJECTION_REASON_CHARS");
    std::env::remove_var("FOREMAN_NOTIFY_DROPPED_CLAIMS");
    std::env::remove_var("FOREMAN_LOG_FILTER");

    assert_eq!(config.validation.min_rejection_reason_chars, 50);
    assert!(!config.pool.notify_dropped_claims);
    assert_eq!(config.logging.filter, "warn");
}

#[test]
#[serial]
fn test_unparseable_env_override_is_ignored() {
    let dir = TempDir::new().unwrap();

    std::env::set_var("FOREMAN_MIN_REJECTION_REASON_CHARS", "plenty");
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    std::env::remove_var("FOREMAN_MIN_REJECTION_REASON_CHARS");

    assert_eq!(
        config.validation.min_rejection_reason_chars,
        MIN_REJECTION_REASON_CHARS
    );
}

#[test]
#[serial]
fn test_invalid_toml_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foreman.toml");
    fs::write(&path, "validation = \"not a table\"").unwrap();

    let err = ConfigLoader::load_from_file(&path).unwrap_err();
    assert_eq!(
        err.category,
        foreman::core::types::ErrorCategory::ValidationError
    );
}

#[test]
fn test_validator_enforces_the_reason_floor() {
    let mut config = ForemanConfig::default();
    config.validation.min_rejection_reason_chars = MIN_REJECTION_REASON_CHARS - 1;
    assert!(ConfigValidator::validate(&config).is_err());

    config.validation.min_rejection_reason_chars = MIN_REJECTION_REASON_CHARS;
    assert!(ConfigValidator::validate(&config).is_ok());
}

#[test]
fn test_engine_settings_come_from_config() {
    let mut config = ForemanConfig::default();
    config.validation.min_rejection_reason_chars = 35;
    config.pool.notify_dropped_claims = false;

    let settings = foreman::core::EngineSettings::from_config(&config);
    assert_eq!(settings.min_rejection_reason_chars, 35);
    assert!(!settings.notify_dropped_claims);
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = ForemanConfig::default();
    let rendered = toml::to_string(&config).unwrap();
    let back: ForemanConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(
        back.validation.min_rejection_reason_chars,
        config.validation.min_rejection_reason_chars
    );
    assert_eq!(back.logging.filter, config.logging.filter);
}
