//! Integration tests for xrsplice-config
//!
//! These tests verify the config loading pipeline with real file system operations.

use xrsplice_config::testing::TestEnvironment;
use xrsplice_config::{Config, LogLevel, SessionMode};

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let env = TestEnvironment::new().unwrap();
    let path = env
        .write_config(
            r#"
[logging]
level = "trace"
ansi = true

[sessions]
mode = "single"

[intercept]
disabled = ["xrCreateSession"]
"#,
        )
        .unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.logging.level, LogLevel::Trace);
    assert!(config.logging.ansi);
    assert_eq!(config.sessions.mode, SessionMode::Single);
    assert_eq!(config.intercept.disabled, vec!["xrCreateSession"]);
}

/// Missing sections fall back to defaults
#[test]
fn test_partial_config_uses_defaults() {
    let env = TestEnvironment::new().unwrap();
    let path = env.write_config("[sessions]\nmode = \"single\"\n").unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.sessions.mode, SessionMode::Single);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(config.intercept.disabled.is_empty());
}

/// Test config hierarchy: explicit file overrides global
#[test]
fn test_explicit_config_overrides_global() {
    let env = TestEnvironment::new().unwrap();
    let global = env
        .create_file(
            "global/config.toml",
            br#"
[logging]
level = "warn"

[intercept]
disabled = ["xrGetSystem"]
"#,
        )
        .unwrap();
    let explicit = env
        .write_config("[intercept]\ndisabled = [\"xrCreateSession\"]\n")
        .unwrap();

    let mut config = Config::load_from(&global).unwrap();
    config.merge(Config::load_from(&explicit).unwrap());

    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.intercept.disabled, vec!["xrCreateSession"]);
}

/// Malformed TOML surfaces as a parse error, not a panic
#[test]
fn test_invalid_toml_is_an_error() {
    let env = TestEnvironment::new().unwrap();
    let path = env.write_config("[sessions\nmode = ").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, xrsplice_config::ConfigError::Toml(_)));
}

/// Unknown enum values are rejected by serde
#[test]
fn test_unknown_session_mode_rejected() {
    let env = TestEnvironment::new().unwrap();
    let path = env.write_config("[sessions]\nmode = \"pooled\"\n").unwrap();

    assert!(Config::load_from(&path).is_err());
}

/// Missing file reports an IO error
#[test]
fn test_missing_file_is_io_error() {
    let env = TestEnvironment::new().unwrap();
    let err = Config::load_from(&env.root.join("absent.toml")).unwrap_err();
    assert!(matches!(err, xrsplice_config::ConfigError::Io(_)));
}
