use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::topic::Topic;

/// Transport-assigned message identifier (stable across redeliveries).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A message as seen by a consumer.
///
/// Notes:
/// - `message_id` is assigned once at publish time and survives redelivery,
///   so consumers can correlate retries in logs.
/// - `attempt` starts at 1 and is incremented by the transport on every redelivery.
/// - `payload` is the raw JSON body; decoding is the handler's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    message_id: MessageId,
    topic: Topic,
    attempt: u32,
    published_at: DateTime<Utc>,
    payload: JsonValue,
}

impl Envelope {
    pub fn new(topic: Topic, payload: JsonValue) -> Self {
        Self {
            message_id: MessageId::new(),
            topic,
            attempt: 1,
            published_at: Utc::now(),
            payload,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Decode the payload into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        E::deserialize(&self.payload)
    }

    /// The same message, prepared for another delivery attempt.
    pub fn redelivered(mut self) -> Self {
        self.attempt = self.attempt.saturating_add(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivery_keeps_identity_and_bumps_attempt() {
        let env = Envelope::new(Topic::StockManagement, serde_json::json!({"item_id": "s1"}));
        let id = env.message_id();

        let again = env.redelivered().redelivered();
        assert_eq!(again.message_id(), id);
        assert_eq!(again.attempt(), 3);
    }
}
