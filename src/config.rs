//! Configuration system for the Spotify to MQTT bridge
//!
//! Configuration is loaded once at process start and is immutable afterwards.
//! It comes either from a TOML file or, when no file is present, from the
//! `MQTT_SERVER` / `MQTT_PORT` / `MQTT_TOPIC` environment variables.
//! Spotify secrets never live in the file: the file only names the
//! environment variables that hold them.

use crate::protocol::topics::{validate_publish_topic, TopicError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub spotify: SpotifySection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub poll: PollSection,
}

/// Spotify Web API section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpotifySection {
    /// Environment variable containing the OAuth client id
    pub client_id_env: String,
    /// Environment variable containing the OAuth client secret
    pub client_secret_env: String,
    /// Environment variable containing the long-lived refresh token
    pub refresh_token_env: String,
    /// Base URL of the accounts service (token endpoint lives at `/api/token`)
    pub accounts_url: String,
    /// Base URL of the Web API (player endpoint lives at `/me/player`)
    pub api_url: String,
    /// Refresh the access token once it is this close to expiry
    pub refresh_margin_secs: i64,
    /// Per-request HTTP timeout in seconds, 0 disables the timeout
    pub request_timeout_secs: u64,
}

impl Default for SpotifySection {
    fn default() -> Self {
        Self {
            client_id_env: "CLIENT_ID".to_string(),
            client_secret_env: "CLIENT_SECRET".to_string(),
            refresh_token_env: "REFRESH_TOKEN".to_string(),
            accounts_url: "https://accounts.spotify.com".to_string(),
            api_url: "https://api.spotify.com/v1".to_string(),
            refresh_margin_secs: 20,
            request_timeout_secs: 10,
        }
    }
}

impl SpotifySection {
    /// HTTP timeout applied to token and player requests
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker host name or address
    pub server: String,
    /// Broker port (default: 1883)
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Topic the playback state is published to (and echoed from)
    pub topic: String,
    /// QoS used for the retained publish (default: 0, at most once)
    #[serde(default)]
    pub qos: u8,
    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// How long to wait for the broker's ConnAck at start-up
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Pause before the event loop polls again after a connection error
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl MqttSection {
    /// Section with every optional field at its default
    pub fn new(server: impl Into<String>, port: u16, topic: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            topic: topic.into(),
            qos: 0,
            tls: false,
            keep_alive_secs: default_keep_alive(),
            username_env: None,
            password_env: None,
            connect_timeout_secs: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// Polling loop section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSection {
    /// Pause between the end of one tick and the start of the next
    pub interval_ms: u64,
    /// Terminate the process on the first tick fault instead of continuing
    pub exit_on_error: bool,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            exit_on_error: false,
        }
    }
}

impl PollSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// OAuth client secrets resolved from the environment at start-up
#[derive(Clone, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `MQTT_SERVER`, `MQTT_PORT` and `MQTT_TOPIC`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Environment-only configuration with an injectable variable lookup
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = Self::lookup_required(&lookup, "MQTT_SERVER")?;
        let topic = Self::lookup_required(&lookup, "MQTT_TOPIC")?;
        let port = match lookup("MQTT_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidConfig(format!("MQTT_PORT '{raw}' is not a valid port"))
            })?,
            None => default_mqtt_port(),
        };

        let config = BridgeConfig {
            spotify: SpotifySection::default(),
            mqtt: MqttSection::new(server, port, topic),
            poll: PollSection::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_publish_topic(&self.mqtt.topic)?;

        if self.mqtt.server.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.server must not be empty".to_string(),
            ));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.port must be greater than 0".to_string(),
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "mqtt.qos must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "poll.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.spotify.refresh_margin_secs < 0 {
            return Err(ConfigError::InvalidConfig(
                "spotify.refresh_margin_secs must not be negative".to_string(),
            ));
        }

        for (field, value) in [
            ("spotify.accounts_url", &self.spotify.accounts_url),
            ("spotify.api_url", &self.spotify.api_url),
        ] {
            Url::parse(value).map_err(|e| {
                ConfigError::InvalidConfig(format!("{field} '{value}' is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }

    /// Resolve Spotify secrets from the environment variables named in `[spotify]`
    pub fn spotify_credentials(&self) -> Result<SpotifyCredentials, ConfigError> {
        self.spotify_credentials_with(|name| std::env::var(name).ok())
    }

    pub fn spotify_credentials_with<F>(&self, lookup: F) -> Result<SpotifyCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(SpotifyCredentials {
            client_id: Self::lookup_required(&lookup, &self.spotify.client_id_env)?,
            client_secret: Self::lookup_required(&lookup, &self.spotify.client_secret_env)?,
            refresh_token: Self::lookup_required(&lookup, &self.spotify.refresh_token_env)?,
        })
    }

    fn lookup_required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
server = "localhost"
topic = "spotify/now-playing"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}
