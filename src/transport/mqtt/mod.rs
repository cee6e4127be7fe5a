//! MQTT client for the now-playing topic
//!
//! The module separates pure functions from I/O:
//!
//! - [`connection`] - connection state, options and errors
//! - [`message_handler`] - event routing and the inbound message echo
//! - [`client`] - the rumqttc client and its background event-loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use spotify_mqtt::config::MqttSection;
//! use spotify_mqtt::transport::mqtt::MqttClient;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection::new("localhost", 1883, "spotify/now-playing");
//!
//! let mut client = MqttClient::new(config)?;
//! client.connect().await?;
//! client
//!     .publish_retained("spotify/now-playing", br#"{"playing":false}"#.to_vec())
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{ConnectionState, MqttError};
pub use message_handler::{EventRoute, InboundMessage, MessageHandler};
