//! spotify-mqtt
//!
//! Polls the Spotify Web API for the user's current playback state and
//! republishes it as a retained JSON message on an MQTT topic.
//!
//! # Overview
//!
//! - [`spotify`] - access token refresh and the player endpoint
//! - [`protocol`] - playback state, the JSON envelope and topic validation
//! - [`publisher`] - retained publishing through the [`transport::Transport`] seam
//! - [`transport`] - the rumqttc client and its background event loop
//! - [`poller`] - the fixed-interval loop tying them together
//!
//! # Quick Start
//!
//! ```rust
//! use spotify_mqtt::protocol::{PlaybackState, PublishedMessage};
//!
//! let state = PlaybackState::playing("Song A", "Artist X");
//! let payload = PublishedMessage::from(&state).to_payload().unwrap();
//!
//! assert_eq!(
//!     String::from_utf8(payload).unwrap(),
//!     r#"{"playing":true,"track":"Song A","artist":"Artist X"}"#
//! );
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod poller;
pub mod protocol;
pub mod publisher;
pub mod spotify;
pub mod testing;
pub mod transport;

pub use config::{BridgeConfig, ConfigError, SpotifyCredentials};
pub use error::{BridgeError, BridgeResult};
pub use poller::{PollStats, Poller};
pub use protocol::{PlaybackState, PublishedMessage};
pub use publisher::{PublishError, StatePublisher};
pub use transport::mqtt::MqttClient;
