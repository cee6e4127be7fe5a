//! The fixed-interval poll loop
//!
//! One tick refreshes the access token if needed, reads the player state and
//! publishes it retained. Faults end the tick early and are counted; the
//! next tick retries from scratch. A tick that overruns the interval simply
//! delays the next one.

use crate::config::{BridgeConfig, ConfigError, PollSection, SpotifyCredentials};
use crate::error::{BridgeError, BridgeResult};
use crate::poll_span;
use crate::protocol::PlaybackState;
use crate::publisher::StatePublisher;
use crate::spotify::{build_http_client, NowPlayingFetcher, TokenManager};
use crate::transport::Transport;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Per-process tick counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub published: u64,
    pub auth_failures: u64,
    pub fetch_failures: u64,
    pub publish_failures: u64,
}

impl PollStats {
    fn record_failure(&mut self, error: &BridgeError) {
        match error {
            BridgeError::Auth(_) => self.auth_failures += 1,
            BridgeError::Fetch(_) => self.fetch_failures += 1,
            BridgeError::Publish(_) | BridgeError::Transport(_) => self.publish_failures += 1,
            BridgeError::Config(_) => {}
        }
    }

    pub fn failures(&self) -> u64 {
        self.auth_failures + self.fetch_failures + self.publish_failures
    }
}

/// Drives token refresh, fetch and publish on a fixed interval
pub struct Poller<T: Transport> {
    tokens: TokenManager,
    fetcher: NowPlayingFetcher,
    publisher: StatePublisher<T>,
    settings: PollSection,
    stats: PollStats,
    last_state: Option<PlaybackState>,
}

impl<T: Transport> Poller<T> {
    pub fn new(
        tokens: TokenManager,
        fetcher: NowPlayingFetcher,
        publisher: StatePublisher<T>,
        settings: PollSection,
    ) -> Self {
        Self {
            tokens,
            fetcher,
            publisher,
            settings,
            stats: PollStats::default(),
            last_state: None,
        }
    }

    /// Wire up the Spotify clients from configuration around `transport`
    pub fn from_config(
        config: &BridgeConfig,
        credentials: SpotifyCredentials,
        transport: T,
    ) -> BridgeResult<Self> {
        let http = build_http_client(&config.spotify).map_err(|e| {
            ConfigError::InvalidConfig(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self::new(
            TokenManager::new(http.clone(), &config.spotify, credentials),
            NowPlayingFetcher::new(http, &config.spotify),
            StatePublisher::new(transport, config.mqtt.topic.clone()),
            config.poll.clone(),
        ))
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn last_state(&self) -> Option<&PlaybackState> {
        self.last_state.as_ref()
    }

    pub fn publisher(&self) -> &StatePublisher<T> {
        &self.publisher
    }

    /// Run one tick: token, then player state, then publish
    ///
    /// Returns the state that was published. A failed step skips the steps
    /// after it.
    pub async fn tick(&mut self) -> BridgeResult<PlaybackState> {
        self.stats.ticks += 1;

        match self.run_steps().await {
            Ok(state) => {
                self.stats.published += 1;
                self.note_state(&state);
                Ok(state)
            }
            Err(e) => {
                self.stats.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self) -> BridgeResult<PlaybackState> {
        let credential = self.tokens.refresh_if_needed().await?;
        let state = self.fetcher.fetch_state(&credential.access_token).await?;
        self.publisher.publish(&state).await?;
        Ok(state)
    }

    fn note_state(&mut self, state: &PlaybackState) {
        if self.last_state.as_ref() == Some(state) {
            debug!("Playback state unchanged");
            return;
        }

        info!(
            playing = state.is_playing(),
            track = state.track_name().unwrap_or_default(),
            artist = state.artist_name().unwrap_or_default(),
            "Playback state changed"
        );
        self.last_state = Some(state.clone());
    }

    /// Tick until `shutdown` turns true (or its sender is dropped)
    ///
    /// With `exit_on_error` set, the first tick fault is returned instead of
    /// being logged and skipped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> BridgeResult<()> {
        let interval = self.settings.interval();
        info!(
            interval_ms = self.settings.interval_ms,
            topic = %self.publisher.topic(),
            exit_on_error = self.settings.exit_on_error,
            "Starting poll loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let tick = self.stats.ticks + 1;
            let result = self.tick().instrument(poll_span!(tick)).await;

            if let Err(e) = result {
                warn!(
                    tick,
                    kind = e.kind(),
                    error = %e.sanitized_message(),
                    "Tick failed"
                );
                if self.settings.exit_on_error {
                    return Err(e);
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Shutdown requested, poll loop stopped");
        Ok(())
    }

    /// Disconnect the transport and log the tick summary
    pub async fn shutdown(mut self) -> PollStats {
        if let Err(e) = self.publisher.transport_mut().disconnect().await {
            warn!("Transport disconnect failed: {}", e);
        }

        let stats = self.stats;
        info!(
            ticks = stats.ticks,
            published = stats.published,
            auth_failures = stats.auth_failures,
            fetch_failures = stats.fetch_failures,
            publish_failures = stats.publish_failures,
            "Poll loop summary"
        );
        stats
    }
}
