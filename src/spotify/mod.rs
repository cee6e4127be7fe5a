//! Spotify Web API access
//!
//! Two small clients share one `reqwest::Client`:
//!
//! - [`auth::TokenManager`] keeps the bearer token fresh through the OAuth
//!   refresh-token grant
//! - [`player::NowPlayingFetcher`] reads the player state with that token

pub mod auth;
pub mod player;

pub use auth::{AuthError, Credential, TokenManager};
pub use player::{parse_player_state, FetchError, NowPlayingFetcher};

use crate::config::SpotifySection;
use reqwest::Client;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for both the accounts and the Web API hosts
pub fn build_http_client(config: &SpotifySection) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Join a configured base URL and an endpoint path
fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
