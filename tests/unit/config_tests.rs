//! Unit tests for configuration parsing and validation.

use std::time::Duration;

use lexstream::config::GlobalConfig;
use lexstream::AppError;

#[test]
fn minimal_config_applies_defaults() {
    let config = GlobalConfig::from_toml_str(r#"api_base_url = "http://localhost:8001""#)
        .expect("minimal config must parse");

    assert_eq!(config.api_base_url, "http://localhost:8001");
    assert_eq!(config.pre_request_delay_ms, 500);
    assert_eq!(config.max_line_bytes, 1_048_576);
    assert_eq!(config.event_channel_capacity, 64);
    assert_eq!(config.connect_timeout_seconds, 0);
    assert_eq!(config.connect_timeout(), None);
}

#[test]
fn explicit_values_override_defaults() {
    let config = GlobalConfig::from_toml_str(
        r#"
api_base_url = "https://analysis.example.com"
pre_request_delay_ms = 0
max_line_bytes = 4096
event_channel_capacity = 8
connect_timeout_seconds = 10
"#,
    )
    .expect("config must parse");

    assert_eq!(config.pre_request_delay(), Duration::ZERO);
    assert_eq!(config.max_line_bytes, 4096);
    assert_eq!(config.event_channel_capacity, 8);
    assert_eq!(config.connect_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn trailing_slash_is_trimmed_from_base_url() {
    let config = GlobalConfig::from_toml_str(r#"api_base_url = "http://localhost:8001/""#)
        .expect("config must parse");
    assert_eq!(config.api_base_url, "http://localhost:8001");
}

#[test]
fn empty_base_url_is_rejected() {
    let err = GlobalConfig::from_toml_str(r#"api_base_url = """#)
        .expect_err("empty base url must be rejected");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_channel_capacity_is_rejected() {
    let err = GlobalConfig::from_toml_str(
        r#"
api_base_url = "http://localhost:8001"
event_channel_capacity = 0
"#,
    )
    .expect_err("zero capacity must be rejected");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = GlobalConfig::from_toml_str("api_base_url = ").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}
