//! Access token management through the OAuth refresh-token grant
//!
//! The bearer token lives only in memory for the lifetime of the process.
//! It is refreshed once it is within `refresh_margin_secs` of expiry; a
//! failed refresh leaves the last good token in place.

use super::endpoint;
use crate::config::{SpotifyCredentials, SpotifySection};
use crate::error::redact_secrets;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Bearer token and its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Expiry as Unix seconds
    pub expires_at: i64,
}

impl Credential {
    /// Whether the token is within `margin` seconds of expiry (or past it)
    pub fn needs_refresh(&self, now: i64, margin: i64) -> bool {
        self.expires_at - now <= margin
    }
}

/// Token refresh errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Body of a successful refresh-token grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u32,
    /// Present when the accounts service rotates the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Credential this response grants at Unix time `now`
    pub fn into_credential(self, now: i64) -> Credential {
        Credential {
            access_token: self.access_token,
            expires_at: now + i64::from(self.expires_in),
        }
    }
}

/// Parse the token endpoint body, rejecting bodies without the expected fields
pub fn parse_token_response(body: &str) -> Result<TokenResponse, AuthError> {
    serde_json::from_str(body).map_err(|e| AuthError::MalformedResponse(e.to_string()))
}

/// Holds the current credential and refreshes it on demand
pub struct TokenManager {
    client: Client,
    token_url: String,
    credentials: SpotifyCredentials,
    refresh_margin: i64,
    current: Option<Credential>,
}

impl TokenManager {
    pub fn new(client: Client, config: &SpotifySection, credentials: SpotifyCredentials) -> Self {
        Self {
            client,
            token_url: endpoint(&config.accounts_url, "api/token"),
            credentials,
            refresh_margin: config.refresh_margin_secs,
            current: None,
        }
    }

    /// Last credential obtained, if any
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Return a valid credential, refreshing against the wall clock if needed
    pub async fn refresh_if_needed(&mut self) -> Result<Credential, AuthError> {
        self.refresh_if_needed_at(chrono::Utc::now().timestamp())
            .await
    }

    /// Return a valid credential as of Unix time `now`
    ///
    /// The stored credential is returned unchanged while it has more than
    /// the refresh margin left. Otherwise a refresh-token grant is performed
    /// and the new credential expires at `now + expires_in`.
    pub async fn refresh_if_needed_at(&mut self, now: i64) -> Result<Credential, AuthError> {
        if let Some(credential) = &self.current {
            if !credential.needs_refresh(now, self.refresh_margin) {
                return Ok(credential.clone());
            }
            debug!(
                expires_at = credential.expires_at,
                now, "Access token expiring, refreshing"
            );
        }

        let response = self.request_token().await?;
        if let Some(rotated) = response.refresh_token.clone() {
            debug!("Accounts service rotated the refresh token");
            self.credentials.refresh_token = rotated;
        }

        let credential = response.into_credential(now);
        info!(
            expires_at = credential.expires_at,
            "Spotify access token refreshed"
        );
        self.current = Some(credential.clone());
        Ok(credential)
    }

    async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self.client.post(&self.token_url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, body = %redact_secrets(&body), "Token endpoint response");

        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body: redact_secrets(&body),
            });
        }

        parse_token_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_credentials() -> SpotifyCredentials {
        SpotifyCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_refresh_response_at_known_time() {
        let response = parse_token_response(r#"{"access_token":"abc","expires_in":3600}"#).unwrap();
        let credential = response.into_credential(1000);

        assert_eq!(credential.access_token, "abc");
        assert_eq!(credential.expires_at, 4600);
    }

    #[test]
    fn test_full_spotify_response_parses() {
        let body = r#"{
            "access_token": "BQD",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "user-read-playback-state",
            "refresh_token": "AQB"
        }"#;
        let response = parse_token_response(body).unwrap();
        assert_eq!(response.refresh_token.as_deref(), Some("AQB"));
    }

    #[test]
    fn test_response_missing_fields_is_malformed() {
        assert!(matches!(
            parse_token_response(r#"{"access_token":"abc"}"#),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_token_response(r#"{"expires_in":3600}"#),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_token_response(r#"{"error":"invalid_grant"}"#),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_token_response("not json"),
            Err(AuthError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_needs_refresh_boundaries() {
        let credential = Credential {
            access_token: "abc".to_string(),
            expires_at: 4600,
        };

        assert!(!credential.needs_refresh(1000, 20));
        assert!(!credential.needs_refresh(4579, 20));
        assert!(credential.needs_refresh(4580, 20));
        assert!(credential.needs_refresh(4600, 20));
        assert!(credential.needs_refresh(9000, 20));
    }

    #[test]
    fn test_token_url_from_config() {
        let client = Client::new();
        let mut config = SpotifySection::default();
        config.accounts_url = "http://127.0.0.1:9000/".to_string();

        let manager = TokenManager::new(client, &config, test_credentials());
        assert_eq!(manager.token_url, "http://127.0.0.1:9000/api/token");
        assert!(manager.current().is_none());
    }

    proptest! {
        #[test]
        fn expiry_is_now_plus_expires_in(
            now in 0i64..4_000_000_000,
            expires_in in any::<u32>(),
        ) {
            let body = format!(r#"{{"access_token":"tok","expires_in":{expires_in}}}"#);
            let credential = parse_token_response(&body).unwrap().into_credential(now);
            prop_assert_eq!(credential.expires_at, now + i64::from(expires_in));
        }

        #[test]
        fn fresh_token_is_kept_until_margin(
            now in 0i64..4_000_000_000,
            remaining in 21i64..100_000,
        ) {
            let credential = Credential { access_token: "tok".to_string(), expires_at: now + remaining };
            prop_assert!(!credential.needs_refresh(now, 20));
            prop_assert!(credential.needs_refresh(now + remaining - 20, 20));
        }
    }
}
