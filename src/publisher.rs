//! Retained publishing of the playback state
//!
//! The publisher owns the transport and the topic. Every message goes out
//! with the retain flag set so that a late subscriber immediately learns what
//! is playing. There is no acknowledgment wait and no retry: a message that
//! cannot be handed to the transport is lost and the next tick publishes a
//! fresh one.

use crate::protocol::{PlaybackState, PublishedMessage};
use crate::transport::Transport;
use thiserror::Error;
use tracing::debug;

/// Publishing errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize playback state: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport rejected publish: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Publishes the playback state envelope on one topic
pub struct StatePublisher<T: Transport> {
    transport: T,
    topic: String,
}

impl<T: Transport> StatePublisher<T> {
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Serialize `state` and publish it retained
    pub async fn publish(&self, state: &PlaybackState) -> Result<(), PublishError> {
        let payload = PublishedMessage::from(state).to_payload()?;
        let size = payload.len();

        self.transport
            .publish(&self.topic, payload, true)
            .await
            .map_err(|e| PublishError::Transport(Box::new(e)))?;

        debug!(topic = %self.topic, bytes = size, "Published playback state");
        Ok(())
    }
}
