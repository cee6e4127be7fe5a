//! Message types and topic rules for the now-playing topic
//!
//! This module defines the playback state produced by the Spotify fetcher and
//! the JSON envelope published to MQTT.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
