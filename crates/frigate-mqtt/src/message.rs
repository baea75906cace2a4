//! Inbound messages handed from the event loop to the router.

use chrono::{DateTime, Utc};
use rumqttc::Publish;

/// A message received from the broker.
///
/// The payload is decoded as UTF-8 (invalid sequences replaced) and
/// otherwise passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    /// Convert a raw rumqttc publish.
    pub fn from_publish(publish: &Publish) -> Self {
        Self::new(
            publish.topic.clone(),
            String::from_utf8_lossy(&publish.payload).into_owned(),
        )
    }
}
