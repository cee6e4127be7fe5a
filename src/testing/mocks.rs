//! Mock implementations for testing
//!
//! Provides a mock Transport that records every publish so the poll loop and
//! publisher can be tested without an MQTT broker.

use crate::transport::{mqtt::ConnectionState, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// A publish captured by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl RecordedPublish {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum MockTransportError {
    #[error("Mock connection failure")]
    Connect,
    #[error("Mock publish failure")]
    Publish,
}

/// Mock transport for testing
///
/// Clones share the recorded history and the failure switch, so a test can
/// keep a handle while the poller owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<RecordedPublish>>>,
    should_fail: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        transport.connected.store(true, Ordering::SeqCst);
        transport
    }

    pub fn with_failure() -> Self {
        let transport = Self::default();
        transport.should_fail.store(true, Ordering::SeqCst);
        transport
    }

    /// Toggle publish failures at runtime
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    pub async fn get_published_messages(&self) -> Vec<RecordedPublish> {
        self.published_messages.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.published_messages.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(MockTransportError::Connect);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), Self::Error> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(MockTransportError::Publish);
        }

        self.published_messages.lock().await.push(RecordedPublish {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.should_fail.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        if self.is_connected() {
            Some(ConnectionState::Connected)
        } else {
            Some(ConnectionState::Disconnected(
                "Mock disconnection".to_string(),
            ))
        }
    }
}
