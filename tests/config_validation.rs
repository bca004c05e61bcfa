//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use macer::config::{DeviceConfig, IdentityConfig, LoggingConfig, MacerConfig};
use macer::protocol::DerivationMode;

#[test]
fn test_default_config_validates() {
    let config = MacerConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("macer.toml");

    let config = MacerConfig::default_with_overrides(|c| {
        c.device.path = PathBuf::from("/dev/hidraw7");
        c.device.legacy = true;
        c.device.read_timeout = Duration::from_secs(120);
        c.identity.user = "backup".into();
        c.identity.host = "nas01".into();
        c.logging.json = true;
    });
    config.save_to_file(&path).expect("save");

    let loaded = MacerConfig::from_file(&path).expect("load");
    assert_eq!(loaded.device.path, PathBuf::from("/dev/hidraw7"));
    assert_eq!(loaded.device.mode(), DerivationMode::Legacy);
    assert_eq!(loaded.device.read_timeout(), Some(Duration::from_secs(120)));
    assert_eq!(loaded.identity.user, "backup");
    assert_eq!(loaded.identity.host, "nas01");
    assert!(loaded.logging.json);
}

#[test]
fn test_from_file_with_handwritten_toml() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
[device]
path = "/dev/hidraw2"
report_id = false
write_timeout_ms = 500

[logging]
level = "debug"
show_target = true
"#
    )
    .expect("write");

    let config = MacerConfig::from_file(file.path()).expect("load");
    assert!(!config.device.report_id);
    assert_eq!(config.device.write_timeout, Duration::from_millis(500));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.show_target);
    assert_eq!(config.identity.app, "macer");
    assert!(config.validate().is_empty());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = MacerConfig::from_file(dir.path().join("absent.toml")).expect_err("missing file");
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_malformed_toml() {
    let err = MacerConfig::from_toml("[device\npath = 3").expect_err("bad toml");
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_wrong_value_type() {
    assert!(MacerConfig::from_toml("[device]\nwrite_timeout_ms = \"fast\"").is_err());
}

#[test]
fn test_empty_device_path() {
    let device = DeviceConfig {
        path: PathBuf::new(),
        ..DeviceConfig::default()
    };
    let errors = device.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_write_timeout_bounds() {
    let mut device = DeviceConfig::default();
    device.write_timeout = Duration::from_millis(5);
    assert!(device.validate().iter().any(|e| e.contains("too short")));

    device.write_timeout = Duration::from_secs(61);
    assert!(device.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_zero_read_timeout_waits_forever() {
    let device = DeviceConfig::default();
    assert_eq!(device.read_timeout, Duration::ZERO);
    assert_eq!(device.read_timeout(), None);
    assert!(device.validate().is_empty());
}

#[test]
fn test_identity_separators_rejected() {
    let identity = IdentityConfig {
        user: "root/admin".into(),
        ..IdentityConfig::default()
    };
    assert!(identity.validate().iter().any(|e| e.contains("Identity user")));
}

#[test]
fn test_log_level_validation() {
    let mut logging = LoggingConfig::default();
    logging.level = "INFO".into();
    assert!(logging.validate().is_empty());

    logging.level = "chatty".into();
    assert!(logging.validate().iter().any(|e| e.contains("Invalid log level")));
}

#[test]
fn test_log_file_directory_must_exist() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut logging = LoggingConfig::default();

    logging.file = Some(dir.path().join("macer.log"));
    assert!(logging.validate().is_empty());

    logging.file = Some(dir.path().join("missing").join("macer.log"));
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("does not exist")));
}

#[test]
fn test_validate_strict_joins_errors() {
    let config = MacerConfig::default_with_overrides(|c| {
        c.identity.app = String::new();
        c.logging.level = "chatty".into();
    });
    let err = config.validate_strict().expect_err("invalid");
    let message = err.to_string();
    assert!(message.contains("Application name cannot be empty"));
    assert!(message.contains("Invalid log level"));
}
