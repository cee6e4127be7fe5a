//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle
//! log format parsing and configuration from environment variables.

use spotify_mqtt::observability::logging::{default_filter_directives, parse_level, LogFormat};
use tracing::Level;

#[test]
fn test_log_format_parse_known_values() {
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
    assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    assert_eq!(LogFormat::parse("123"), LogFormat::Json);
}

#[test]
fn test_log_level_defaults_to_info() {
    assert_eq!(parse_level(""), Level::INFO);
    assert_eq!(parse_level("verbose"), Level::INFO);
    assert_eq!(parse_level("debug"), Level::DEBUG);
}

#[test]
fn test_dependency_noise_is_filtered() {
    let directives = default_filter_directives(Level::TRACE);

    assert!(directives.starts_with("trace"));
    for dependency in ["rumqttc", "hyper", "reqwest"] {
        assert!(
            directives.contains(&format!("{dependency}=warn")),
            "{dependency} should be capped at warn"
        );
    }
}

#[test]
fn test_span_macros_create_named_spans() {
    let poll = spotify_mqtt::poll_span!(tick = 7u64);
    let mqtt = spotify_mqtt::mqtt_span!(server = "localhost");

    // Without a subscriber the spans are disabled but still constructible
    drop(poll);
    drop(mqtt);
}
