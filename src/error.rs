//! Error types for the Spotify to MQTT bridge
//!
//! Each component owns its error enum; `BridgeError` collects them and
//! classifies tick faults so the poll loop can log and count them.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Top-level error for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Token refresh failed: {0}")]
    Auth(#[from] crate::spotify::AuthError),

    #[error("Fetching playback state failed: {0}")]
    Fetch(#[from] crate::spotify::FetchError),

    #[error("Publishing playback state failed: {0}")]
    Publish(#[from] crate::publisher::PublishError),

    #[error("MQTT transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),
}

impl BridgeError {
    /// Short fault class used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::Auth(_) => "auth",
            BridgeError::Fetch(_) => "fetch",
            BridgeError::Publish(_) => "publish",
            BridgeError::Transport(_) => "transport",
        }
    }

    /// Error text safe to write to logs
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static JSON_SECRET_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"([a-z_]*(?:token|secret|password)[a-z_]*)"\s*:\s*"[^"]*""#)
        .expect("static regex")
});

static KEY_VALUE_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+").expect("static regex")
});

static BEARER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(bearer)\s+[A-Za-z0-9._~+/=-]+").expect("static regex"));

const MAX_MESSAGE_LEN: usize = 500;
const TRUNCATE_SUFFIX: &str = "...[truncated]";

/// Replace token, secret and password values with `***`
///
/// Covers JSON fields (`"access_token": "..."`), form/query pairs
/// (`refresh_token=...`) and `Bearer` authorization values.
pub fn redact_secrets(text: &str) -> String {
    let redacted = JSON_SECRET_FIELD.replace_all(text, r#""${1}":"***""#);
    let redacted = KEY_VALUE_SECRET.replace_all(&redacted, "${1}=***");
    BEARER_TOKEN.replace_all(&redacted, "${1} ***").into_owned()
}

/// Redact secrets and cap the message at 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = redact_secrets(message);

    if sanitized.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN - TRUNCATE_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATE_SUFFIX);
    }

    sanitized
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
