//! Pure message routing and inbound echo handling for MQTT events
//!
//! The bridge subscribes to its own topic only to log what the broker hands
//! back. Inbound publishes leave the event loop through a bounded channel
//! with a non-blocking `try_send`, so a slow consumer can never stall
//! network processing.

use bytes::Bytes;
use rumqttc::v5::Event;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of the inbound message channel
pub const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => {
                use rumqttc::v5::mqttbytes::v5::Packet;
                match incoming {
                    Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                    Packet::Publish(publish) => EventRoute::MessageReceived(InboundMessage {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload.clone(),
                        retain: publish.retain,
                    }),
                    Packet::Disconnect(_) => EventRoute::Disconnected,
                    Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                        packet_id: suback.pkid,
                        return_codes: suback
                            .return_codes
                            .iter()
                            .map(|code| format!("{code:?}"))
                            .collect(),
                    },
                    other => EventRoute::InfrastructureEvent(format!("{other:?}")),
                }
            }
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on the subscribed topic
    MessageReceived(InboundMessage),
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed with reason codes
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<String>,
    },
    /// Infrastructure event (PingResp, PubAck, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// A publish delivered by the broker on the subscribed topic
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

impl InboundMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Outcome of handing an inbound message to the echo channel
#[derive(Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded,
    /// Channel full, message dropped
    Dropped,
    /// Receiver gone, message dropped
    Closed,
}

/// Non-blocking handoff from the event loop to the echo consumer
#[derive(Clone)]
pub struct InboundForwarder {
    sender: mpsc::Sender<InboundMessage>,
}

impl InboundForwarder {
    pub fn new(sender: mpsc::Sender<InboundMessage>) -> Self {
        Self { sender }
    }

    pub fn forward(&self, message: InboundMessage) -> ForwardOutcome {
        match self.sender.try_send(message) {
            Ok(()) => ForwardOutcome::Forwarded,
            Err(mpsc::error::TrySendError::Full(message)) => {
                debug!(topic = %message.topic, "Inbound channel full, dropping message");
                ForwardOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => ForwardOutcome::Closed,
        }
    }
}

/// Log every inbound message until the channel closes
pub async fn run_echo_logger(mut receiver: mpsc::Receiver<InboundMessage>) -> usize {
    let mut received = 0usize;
    while let Some(message) = receiver.recv().await {
        received += 1;
        info!(
            topic = %message.topic,
            retain = message.retain,
            payload = %message.payload_text(),
            "Message received on subscribed topic"
        );
    }
    if received == 0 {
        warn!("Inbound channel closed before any echo was received");
    }
    received
}
