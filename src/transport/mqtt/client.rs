//! Impure I/O operations for MQTT client
//!
//! This module handles network communication, async coordination, and
//! integration with the rumqttc client. The rumqttc event loop runs in its own
//! tokio task; it reports connection state through a `watch` channel and hands
//! inbound messages to the echo channel.

use super::connection::{configure_mqtt_options, qos_from_level, ConnectionState, MqttError};
use super::message_handler::{
    EventRoute, ForwardOutcome, InboundForwarder, InboundMessage, MessageHandler,
    INBOUND_CHANNEL_CAPACITY,
};
use crate::config::MqttSection;
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// MQTT client that publishes to and echoes one topic
pub struct MqttClient {
    config: MqttSection,
    client: AsyncClient,
    // Mutex only makes the client Sync; the loop is moved out on connect
    event_loop: Option<Mutex<EventLoop>>,
    qos: QoS,
    event_loop_handle: Option<JoinHandle<()>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Option<mpsc::Receiver<InboundMessage>>,
}

impl MqttClient {
    pub fn new(config: MqttSection) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(&config)?;
        let qos = qos_from_level(config.qos)?;

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        Ok(MqttClient {
            config,
            client,
            event_loop: Some(Mutex::new(event_loop)),
            qos,
            event_loop_handle: None,
            state_rx: None,
            state_tx: None,
            shutdown_tx: None,
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        })
    }

    /// Topic this client publishes to and subscribes to
    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Take the receiving end of the inbound echo channel (once)
    pub fn take_inbound_receiver(&mut self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inbound_rx.take()
    }

    /// Create connection state and shutdown channels
    #[allow(clippy::type_complexity)]
    fn setup_connection_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let state_channels = watch::channel(ConnectionState::Connecting);
        let shutdown_channels = watch::channel(false);
        (state_channels, shutdown_channels)
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                match *state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(ref reason) => {
                        return Err(MqttError::ConnectionFailed(reason.clone()));
                    }
                    ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailed(
                        "State channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Connect to the broker and start the background event loop
    ///
    /// Only returns success once the broker's ConnAck has been seen. The
    /// subscription to the echo topic is (re)issued on every ConnAck.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| MqttError::ConnectionFailed("Event loop already started".to_string()))?
            .into_inner()
            .map_err(|_| MqttError::ConnectionFailed("Event loop lock poisoned".to_string()))?;

        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) =
            Self::setup_connection_channels();
        self.state_rx = Some(state_rx.clone());
        self.state_tx = Some(state_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        info!(
            server = %self.config.server,
            port = self.config.port,
            topic = %self.config.topic,
            "Connecting to MQTT broker"
        );

        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            self.client.clone(),
            self.config.topic.clone(),
            state_tx,
            shutdown_rx,
            InboundForwarder::new(self.inbound_tx.clone()),
            Duration::from_millis(self.config.reconnect_delay_ms),
        ));
        self.event_loop_handle = Some(handle);

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        Self::wait_for_connection_confirmation(state_rx, timeout).await
    }

    /// Drive the rumqttc event loop until shutdown
    ///
    /// Polling again after an error makes rumqttc reconnect; the fixed
    /// `reconnect_delay` only keeps a dead broker from turning this into a
    /// busy loop.
    async fn run_event_loop(
        mut event_loop: EventLoop,
        client: AsyncClient,
        topic: String,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        forwarder: InboundForwarder,
        reconnect_delay: Duration,
    ) {
        info!("Starting MQTT event loop");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            Self::process_event_route(route, &state_tx, &client, &topic, &forwarder);
                        }
                        Err(e) => {
                            error!("MQTT event loop error: {}", e);
                            let _ = state_tx.send(ConnectionState::Disconnected(e.to_string()));

                            if !Self::interruptible_sleep(shutdown_rx.clone(), reconnect_delay).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT event loop stopped");
    }

    /// Process routed MQTT event
    fn process_event_route(
        route: EventRoute,
        state_tx: &watch::Sender<ConnectionState>,
        client: &AsyncClient,
        topic: &str,
        forwarder: &InboundForwarder,
    ) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                info!("Connected to MQTT broker");
                let _ = state_tx.send(ConnectionState::Connected);

                // Echo subscription, also restores it after a reconnect
                match client.try_subscribe(topic, QoS::AtMostOnce) {
                    Ok(()) => debug!(target: "mqtt_transport", "Subscribing to {}", topic),
                    Err(e) => {
                        let error = MqttError::SubscriptionFailed(Box::new(e));
                        error!(topic = %topic, "{}", error);
                    }
                }
            }
            EventRoute::MessageReceived(message) => {
                if forwarder.forward(message) == ForwardOutcome::Closed {
                    debug!(target: "mqtt_transport", "Inbound echo receiver gone, message dropped");
                }
            }
            EventRoute::Disconnected => {
                warn!("MQTT broker disconnected the client");
                let _ = state_tx.send(ConnectionState::Disconnected(
                    "Broker disconnected".to_string(),
                ));
            }
            EventRoute::SubscriptionConfirmed {
                packet_id: _,
                return_codes,
            } => {
                debug!(target: "mqtt_transport", "Subscription confirmed: {:?}", return_codes);
            }
            EventRoute::InfrastructureEvent(event_str) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
            }
            EventRoute::OutgoingEvent => {}
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnect delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        // Queue the DISCONNECT packet while the event loop can still flush it
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect request not queued: {}", e);
        }

        if let Some(handle) = self.event_loop_handle.take() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Some(shutdown_tx) = &self.shutdown_tx {
                let _ = shutdown_tx.send(true);
            }

            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => info!("MQTT event loop shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("MQTT event loop ended with error: {}", e),
                Err(_) => warn!("MQTT event loop didn't shut down in time, aborting"),
                _ => {}
            }
        }

        if let Some(state_tx) = &self.state_tx {
            let _ = state_tx.send(ConnectionState::Disconnected(
                "Client disconnected".to_string(),
            ));
        }

        info!("MQTT client disconnected");
        Ok(())
    }

    /// Get current connection state
    /// Returns None if connection hasn't been established yet
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Check connection state before operations
    fn check_connection_state(&self) -> Result<(), MqttError> {
        let state_rx = self.state_rx.as_ref().ok_or_else(|| MqttError::NotConnected {
            state: ConnectionState::Disconnected("connect() not called".to_string()),
        })?;

        let current_state = state_rx.borrow().clone();
        if !current_state.can_publish() {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        Ok(())
    }

    /// Queue a publish without waiting for the broker
    ///
    /// Fails instead of blocking when the connection is down or the outgoing
    /// request queue is full, so the message for this tick is dropped.
    pub async fn publish_message(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), MqttError> {
        self.check_connection_state()?;

        self.client
            .try_publish(topic, self.qos, retain, payload)
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!(topic = %topic, retain, qos = ?self.qos, "Queued MQTT publish");
        Ok(())
    }

    /// Publish with the retain flag set
    pub async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.publish_message(topic, payload, true).await
    }
}

/// Implementation of Transport trait for MqttClient
#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), Self::Error> {
        self.publish_message(topic, payload, retain).await
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttClient::connection_state(self)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
