//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use save_relay::config::{LoggingConfig, NodeConfig, RelayConfig, TransferConfig};
use save_relay::error::ConfigError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = RelayConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_zero_chunk_size() {
    let config = RelayConfig::default_with_overrides(|c| c.transfer.chunk_size = 0);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Chunk size must be greater than 0")));
}

#[test]
fn test_chunk_size_must_fit_packet() {
    let mut transfer = TransferConfig::default();
    transfer.chunk_size = transfer.max_packet_size;
    assert!(transfer
        .validate()
        .iter()
        .any(|e| e.contains("exceeds max packet size")));

    transfer.chunk_size = transfer.max_packet_size - 1;
    assert!(transfer.validate().is_empty());
}

#[test]
fn test_request_timeout_bounds() {
    let mut transfer = TransferConfig {
        request_timeout: Duration::from_millis(5),
        ..TransferConfig::default()
    };
    assert!(transfer.validate().iter().any(|e| e.contains("too short")));

    transfer.request_timeout = Duration::from_secs(601);
    assert!(transfer.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_zero_tick_interval() {
    let node = NodeConfig {
        tick_interval: Duration::ZERO,
        ..NodeConfig::default()
    };
    assert_eq!(node.validate().len(), 1);
}

#[test]
fn test_blank_log_filter() {
    let logging = LoggingConfig {
        filter: Some("   ".to_string()),
        ..LoggingConfig::default()
    };
    assert!(logging.validate().iter().any(|e| e.contains("blank")));
}

#[test]
fn test_multiple_errors_collected() {
    let config = RelayConfig::default_with_overrides(|c| {
        c.transfer.chunk_size = 0;
        c.transfer.max_blob_size = 0;
        c.logging.app_name = String::new();
    });
    assert_eq!(config.validate().len(), 3);
    match config.validate_strict() {
        Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn test_toml_partial_sections_use_defaults() {
    let config = RelayConfig::from_toml(
        r#"
        [transfer]
        chunk_size = 512
        max_packet_size = 1170
        request_timeout = 5000
        reassembly_timeout = 2000
        max_blob_size = 1048576

        [logging]
        app_name = "host"
        log_level = "debug"
        json_format = true
        "#,
    )
    .unwrap();

    assert_eq!(config.transfer.chunk_size, 512);
    assert_eq!(config.transfer.request_timeout, Duration::from_secs(5));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    assert_eq!(config.node.tick_interval, NodeConfig::default().tick_interval);
    assert!(config.validate().is_empty());
}

#[test]
fn test_toml_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.toml");

    let config = RelayConfig::default_with_overrides(|c| {
        c.transfer.chunk_size = 900;
        c.node.log_metrics_every_ticks = 600;
    });
    config.save_to_file(&path).unwrap();

    let loaded = RelayConfig::from_file(&path).unwrap();
    assert_eq!(loaded.transfer.chunk_size, 900);
    assert_eq!(loaded.node.log_metrics_every_ticks, 600);
    assert_eq!(loaded.transfer.request_timeout, config.transfer.request_timeout);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = RelayConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let err = RelayConfig::from_toml("[transfer\nchunk_size = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_example_config_parses() {
    let example = RelayConfig::example_config();
    let parsed = RelayConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}
