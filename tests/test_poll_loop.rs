//! Poll loop integration tests
//!
//! Runs complete ticks against a mock Spotify service and a recording
//! transport, checking what reaches the broker and what is skipped.

use spotify_mqtt::config::{BridgeConfig, SpotifyCredentials};
use spotify_mqtt::error::BridgeError;
use spotify_mqtt::poller::Poller;
use spotify_mqtt::protocol::PlaybackState;
use spotify_mqtt::testing::mocks::MockTransport;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOPIC: &str = "spotify/now-playing";

fn bridge_config(server: &MockServer, exit_on_error: bool) -> BridgeConfig {
    let toml_content = format!(
        r#"
[spotify]
accounts_url = "{uri}"
api_url = "{uri}/v1"

[mqtt]
server = "localhost"
topic = "{TOPIC}"

[poll]
interval_ms = 20
exit_on_error = {exit_on_error}
"#,
        uri = server.uri()
    );
    let config: BridgeConfig = toml::from_str(&toml_content).unwrap();
    config.validate().unwrap();
    config
}

fn credentials() -> SpotifyCredentials {
    SpotifyCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"access_token":"abc","expires_in":3600}"#),
        )
        .mount(server)
        .await;
}

async fn mount_player_body(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn poller(server: &MockServer, transport: MockTransport) -> Poller<MockTransport> {
    Poller::from_config(&bridge_config(server, false), credentials(), transport).unwrap()
}

#[tokio::test]
async fn test_tick_publishes_playing_state_retained() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_player_body(
        &server,
        r#"{"is_playing":true,"item":{"name":"Song A","artists":[{"name":"Artist X"},{"name":"Artist Y"}]}}"#,
    )
    .await;

    let transport = MockTransport::new();
    let mut poller = poller(&server, transport.clone());

    let state = poller.tick().await.unwrap();
    assert_eq!(state, PlaybackState::playing("Song A", "Artist X"));

    let published = transport.get_published_messages().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, TOPIC);
    assert!(published[0].retain);
    assert_eq!(
        published[0].payload_text(),
        r#"{"playing":true,"track":"Song A","artist":"Artist X"}"#
    );
}

#[tokio::test]
async fn test_tick_publishes_stopped_state_with_nulls() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_player_body(&server, r#"{"is_playing":false}"#).await;

    let transport = MockTransport::new();
    let mut poller = poller(&server, transport.clone());
    poller.tick().await.unwrap();

    let published = transport.get_published_messages().await;
    assert_eq!(
        published[0].payload_text(),
        r#"{"playing":false,"track":null,"artist":null}"#
    );
}

#[tokio::test]
async fn test_auth_failure_skips_fetch_and_publish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_client"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let transport = MockTransport::new();
    let mut poller = poller(&server, transport.clone());

    let result = poller.tick().await;

    assert!(matches!(result, Err(BridgeError::Auth(_))));
    assert_eq!(result.unwrap_err().kind(), "auth");
    assert!(transport.get_published_messages().await.is_empty());
    assert_eq!(poller.stats().auth_failures, 1);
}

#[tokio::test]
async fn test_fetch_failure_skips_publish() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let transport = MockTransport::new();
    let mut poller = poller(&server, transport.clone());

    let result = poller.tick().await;

    assert!(matches!(result, Err(BridgeError::Fetch(_))));
    assert!(transport.get_published_messages().await.is_empty());
    assert_eq!(poller.stats().fetch_failures, 1);
    assert_eq!(poller.stats().published, 0);
}

#[tokio::test]
async fn test_publish_failure_drops_message_then_recovers() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_player_body(&server, r#"{"is_playing":false}"#).await;

    let transport = MockTransport::with_failure();
    let mut poller = poller(&server, transport.clone());

    let result = poller.tick().await;
    assert!(matches!(result, Err(BridgeError::Publish(_))));
    assert!(transport.get_published_messages().await.is_empty());

    transport.set_failing(false);
    poller.tick().await.unwrap();

    assert_eq!(transport.get_published_messages().await.len(), 1);
    assert_eq!(poller.stats().publish_failures, 1);
    assert_eq!(poller.stats().published, 1);
    assert_eq!(poller.stats().ticks, 2);
}

#[tokio::test]
async fn test_token_is_fetched_once_across_ticks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"access_token":"abc","expires_in":3600}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_player_body(&server, r#"{"is_playing":false}"#).await;

    let mut poller = poller(&server, MockTransport::new());
    for _ in 0..3 {
        poller.tick().await.unwrap();
    }
    assert_eq!(poller.stats().published, 3);
}

#[tokio::test]
async fn test_run_publishes_every_tick_until_shutdown() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_player_body(
        &server,
        r#"{"is_playing":true,"item":{"name":"Song A","artists":[{"name":"Artist X"}]}}"#,
    )
    .await;

    let transport = MockTransport::new();
    let mut poller = poller(&server, transport.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = shutdown_tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown_rx))
        .await
        .expect("loop should stop after shutdown")
        .unwrap();

    let published = transport.get_published_messages().await;
    assert!(published.len() >= 2, "expected several ticks, got {}", published.len());
    assert!(published.iter().all(|message| message.retain));
    assert!(published.iter().all(|message| message.topic == TOPIC));

    let stats = poller.shutdown().await;
    assert_eq!(stats.published as usize, published.len());
    assert_eq!(stats.failures(), 0);
}

#[tokio::test]
async fn test_run_with_exit_on_error_stops_on_first_fault() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let mut poller =
        Poller::from_config(&bridge_config(&server, true), credentials(), MockTransport::new())
            .unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = poller.run(shutdown_rx).await;

    assert!(matches!(result, Err(BridgeError::Fetch(_))));
    assert_eq!(poller.stats().ticks, 1);
}
