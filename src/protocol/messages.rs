//! Playback state and the retained JSON envelope
//!
//! `PlaybackState` is what the player endpoint reports for one tick.
//! `PublishedMessage` is its wire form on the MQTT topic.

use serde::{Deserialize, Serialize};

/// Playback state observed during one tick
///
/// Track and artist only exist while something is playing, so a state can
/// never carry a track without an artist or vice versa.
///
/// # Examples
/// ```
/// use spotify_mqtt::protocol::PlaybackState;
///
/// let state = PlaybackState::playing("Song A", "Artist X");
/// assert!(state.is_playing());
/// assert_eq!(state.track_name(), Some("Song A"));
/// assert_eq!(state.artist_name(), Some("Artist X"));
///
/// let idle = PlaybackState::Stopped;
/// assert_eq!(idle.track_name(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing is playing (paused, stopped, or no active device)
    Stopped,
    /// A track is playing
    Playing {
        track_name: String,
        artist_name: String,
    },
}

impl PlaybackState {
    pub fn playing(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self::Playing {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    pub fn track_name(&self) -> Option<&str> {
        match self {
            Self::Playing { track_name, .. } => Some(track_name),
            Self::Stopped => None,
        }
    }

    pub fn artist_name(&self) -> Option<&str> {
        match self {
            Self::Playing { artist_name, .. } => Some(artist_name),
            Self::Stopped => None,
        }
    }
}

/// JSON envelope published (retained) on the now-playing topic
///
/// Always serializes all three keys; `track` and `artist` become `null`
/// when nothing is playing.
///
/// # Examples
/// ```
/// use spotify_mqtt::protocol::{PlaybackState, PublishedMessage};
///
/// let message = PublishedMessage::from(&PlaybackState::Stopped);
/// let json = serde_json::to_string(&message).unwrap();
/// assert_eq!(json, r#"{"playing":false,"track":null,"artist":null}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedMessage {
    pub playing: bool,
    pub track: Option<String>,
    pub artist: Option<String>,
}

impl From<&PlaybackState> for PublishedMessage {
    fn from(state: &PlaybackState) -> Self {
        Self {
            playing: state.is_playing(),
            track: state.track_name().map(str::to_string),
            artist: state.artist_name().map(str::to_string),
        }
    }
}

impl PublishedMessage {
    /// Serialize to the UTF-8 JSON payload sent to the broker
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
