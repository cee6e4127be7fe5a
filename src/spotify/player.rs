//! Now-playing fetcher for the Web API player endpoint

use super::endpoint;
use crate::config::SpotifySection;
use crate::error::redact_secrets;
use crate::protocol::PlaybackState;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Player state fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Player request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Player endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed player response: {0}")]
    MalformedResponse(String),
    #[error("Unexpected player response: {0}")]
    UnexpectedShape(String),
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    is_playing: bool,
    #[serde(default)]
    item: Option<PlayerItem>,
}

#[derive(Debug, Deserialize)]
struct PlayerItem {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

/// Parse a player endpoint body into the playback state
///
/// Only the first listed artist is kept. A response that claims to be
/// playing but has no item, or an item without artists (episodes, ads),
/// is reported as [`FetchError::UnexpectedShape`].
pub fn parse_player_state(body: &[u8]) -> Result<PlaybackState, FetchError> {
    let response: PlayerResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    if !response.is_playing {
        return Ok(PlaybackState::Stopped);
    }

    let item = response
        .item
        .ok_or_else(|| FetchError::UnexpectedShape("playing without an item".to_string()))?;
    let artist = item.artists.into_iter().next().ok_or_else(|| {
        FetchError::UnexpectedShape(format!("item '{}' has no artists", item.name))
    })?;

    Ok(PlaybackState::playing(item.name, artist.name))
}

/// Reads the current playback state with a bearer token
pub struct NowPlayingFetcher {
    client: Client,
    player_url: String,
}

impl NowPlayingFetcher {
    pub fn new(client: Client, config: &SpotifySection) -> Self {
        Self {
            client,
            player_url: endpoint(&config.api_url, "me/player"),
        }
    }

    pub async fn fetch_state(&self, token: &str) -> Result<PlaybackState, FetchError> {
        let response = self
            .client
            .get(&self.player_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        // No active device: the endpoint answers 204 with an empty body
        if status == StatusCode::NO_CONTENT {
            debug!("Player endpoint returned 204, nothing playing");
            return Ok(PlaybackState::Stopped);
        }

        let body = response.bytes().await?;
        let redacted = redact_secrets(&String::from_utf8_lossy(&body));
        debug!(status = %status, body = %redacted, "Player endpoint response");

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: redacted,
            });
        }

        parse_player_state(&body)
    }
}
