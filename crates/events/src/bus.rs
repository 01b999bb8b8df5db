//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the **event bus pattern**: a topic-based pub/sub mechanism that
//! hands upload, query, stock and integration events to the pipeline workers.
//!
//! ## Delivery contract
//!
//! - **Topic-scoped**: a subscriber only sees envelopes published on its topic
//! - **At-least-once**: an envelope is redelivered until it is acknowledged, so consumers
//!   must be idempotent (re-applying the same event must not duplicate artifacts)
//! - **No ordering guarantees** across messages: an `updated` event may overtake `created`
//! - **Explicit settlement**: consumers call [`EventBus::ack`] when done, or
//!   [`EventBus::nack`] to ask for redelivery after a transient failure
//!
//! Transports decide how many redeliveries they allow before dead-lettering.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::envelope::{Envelope, MessageId};
use crate::event::Event;
use crate::topic::Topic;

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport is unreachable or its internal state is unusable.
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    /// The event could not be encoded as JSON.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Settlement referred to a message that is not in flight.
    #[error("message {0} is not in flight")]
    UnknownMessage(MessageId),
}

/// A subscription to a single topic.
///
/// ## Usage Pattern
///
/// ```ignore
/// let mut subscription = bus.subscribe(Topic::StockManagement);
///
/// while let Some(envelope) = subscription.recv().await {
///     match handler.handle(&envelope).await {
///         Disposition::Ack => bus.ack(&envelope)?,
///         Disposition::Retry => bus.nack(envelope)?,
///     }
/// }
/// ```
///
/// A subscription is meant to be drained by one task; fan work out from there.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    receiver: UnboundedReceiver<Envelope>,
}

impl Subscription {
    pub fn new(topic: Topic, receiver: UnboundedReceiver<Envelope>) -> Self {
        Self { topic, receiver }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next envelope. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Try to receive an envelope without waiting.
    pub fn try_recv(&mut self) -> Result<Envelope, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Wait for up to `timeout`; `None` on timeout or when the bus is dropped.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Envelope> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Topic-based event bus (pub/sub with explicit settlement).
///
/// Pipelines only publish (notification fan-out); workers subscribe and settle.
///
/// The trait is object safe so adapters can be injected as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish a raw JSON payload on `topic`.
    fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<MessageId, BusError>;

    /// Subscribe to every envelope published on `topic` from now on.
    fn subscribe(&self, topic: Topic) -> Subscription;

    /// Mark a delivery as processed; it will not be redelivered.
    fn ack(&self, envelope: &Envelope) -> Result<(), BusError>;

    /// Hand a delivery back for redelivery (or dead-lettering once exhausted).
    fn nack(&self, envelope: Envelope) -> Result<(), BusError>;
}

impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<MessageId, BusError> {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        (**self).subscribe(topic)
    }

    fn ack(&self, envelope: &Envelope) -> Result<(), BusError> {
        (**self).ack(envelope)
    }

    fn nack(&self, envelope: Envelope) -> Result<(), BusError> {
        (**self).nack(envelope)
    }
}

/// Encode a typed event and publish it on its own topic.
pub fn publish_event<B, E>(bus: &B, event: &E) -> Result<MessageId, BusError>
where
    B: EventBus + ?Sized,
    E: Event,
{
    let payload = serde_json::to_value(event)?;
    bus.publish(E::TOPIC, payload)
}
