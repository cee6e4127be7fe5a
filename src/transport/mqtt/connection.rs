//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management,
//! option construction and QoS mapping.

use crate::config::MqttSection;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - waiting for the broker's ConnAck
    Connecting,
    /// Successfully connected and ready for operations
    Connected,
    /// Disconnected with reason; the event loop reconnects on its next poll
    Disconnected(String),
}

impl ConnectionState {
    /// Check if connection state allows publishing
    pub fn can_publish(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No ConnAck from broker within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Publishing failed: {0}")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Invalid MQTT configuration: {0}")]
    InvalidConfig(String),
}

/// Map a configured QoS level to the rumqttc enum
pub fn qos_from_level(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidConfig(format!(
            "QoS must be 0, 1 or 2, got {other}"
        ))),
    }
}

/// Unique client id so restarts never collide with a lingering session
pub fn generate_client_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", env!("CARGO_PKG_NAME"), &suffix[..8])
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(config: &MqttSection) -> Result<MqttOptions, MqttError> {
    if config.server.trim().is_empty() {
        return Err(MqttError::InvalidConfig(
            "broker server must not be empty".to_string(),
        ));
    }

    let mut mqtt_options = MqttOptions::new(generate_client_id(), &config.server, config.port);

    if config.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    // Credentials are optional and come from environment variables
    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(&username, &password);
        }
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mqtt_config() -> MqttSection {
        MqttSection::new("localhost", 1883, "spotify/now-playing")
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = test_mqtt_config();
        let options = configure_mqtt_options(&config).unwrap();

        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.client_id().starts_with("spotify-mqtt-"));
    }

    #[test]
    fn test_empty_server_is_rejected() {
        let mut config = test_mqtt_config();
        config.server = "  ".to_string();

        let result = configure_mqtt_options(&config);
        assert!(matches!(result, Err(MqttError::InvalidConfig(_))));
    }

    #[test]
    fn test_client_ids_are_unique() {
        let first = generate_client_id();
        let second = generate_client_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), "spotify-mqtt-".len() + 8);
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(
            qos_from_level(3),
            Err(MqttError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_eq!(
            ConnectionState::Disconnected("test".to_string()),
            ConnectionState::Disconnected("test".to_string())
        );
        assert_ne!(
            ConnectionState::Connected,
            ConnectionState::Disconnected("test".to_string())
        );
    }

    #[test]
    fn test_only_connected_state_can_publish() {
        assert!(ConnectionState::Connected.can_publish());
        assert!(!ConnectionState::Connecting.can_publish());
        assert!(!ConnectionState::Disconnected("gone".to_string()).can_publish());
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("refused".to_string()),
            MqttError::ConnectTimeout(Duration::from_secs(30)),
            MqttError::PublishFailed("test".to_string().into()),
            MqttError::SubscriptionFailed("test".to_string().into()),
            MqttError::NotConnected {
                state: ConnectionState::Disconnected("test".to_string()),
            },
            MqttError::InvalidConfig("test".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
