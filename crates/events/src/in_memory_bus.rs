//! In-memory event bus for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;

use crate::bus::{BusError, EventBus, Subscription};
use crate::envelope::{Envelope, MessageId};
use crate::topic::Topic;

/// Default number of deliveries before a message is dead-lettered.
const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Published envelopes kept for inspection; older ones are dropped first.
pub const PUBLISHED_LOG_CAPACITY: usize = 1024;

/// A message that exhausted its deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    subscribers: HashMap<Topic, Vec<UnboundedSender<Envelope>>>,
    in_flight: HashMap<MessageId, Envelope>,
    published: VecDeque<Envelope>,
    dead_letters: Vec<DeadLetter>,
}

/// In-memory pub/sub bus.
///
/// - No IO
/// - Fan-out to every live subscriber of the topic
/// - Unacknowledged messages stay in flight until `ack`/`nack`
/// - `nack` redelivers immediately with `attempt + 1`; after `max_deliveries`
///   attempts the message is dead-lettered instead
/// - The most recent [`PUBLISHED_LOG_CAPACITY`] published envelopes are kept for
///   inspection
#[derive(Debug)]
pub struct InMemoryEventBus {
    inner: Mutex<Inner>,
    max_deliveries: u32,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    pub fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }

    /// Recently published envelopes on `topic`, in publish order.
    pub fn published(&self, topic: Topic) -> Vec<Envelope> {
        self.lock()
            .map(|inner| {
                inner
                    .published
                    .iter()
                    .filter(|e| e.topic() == topic)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock()
            .map(|inner| inner.dead_letters.clone())
            .unwrap_or_default()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().map(|inner| inner.in_flight.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, BusError> {
        self.inner
            .lock()
            .map_err(|_| BusError::Unavailable("in-memory bus lock poisoned".to_string()))
    }

    fn deliver(inner: &mut Inner, envelope: Envelope) {
        let topic = envelope.topic();
        let mut delivered = false;

        if let Some(subs) = inner.subscribers.get_mut(&topic) {
            // Drop any dead subscribers while delivering.
            subs.retain(|tx| {
                let ok = tx.send(envelope.clone()).is_ok();
                delivered |= ok;
                ok
            });
        }

        if delivered {
            inner.in_flight.insert(envelope.message_id(), envelope);
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<MessageId, BusError> {
        let envelope = Envelope::new(topic, payload);
        let id = envelope.message_id();

        let mut inner = self.lock()?;
        if inner.published.len() == PUBLISHED_LOG_CAPACITY {
            inner.published.pop_front();
        }
        inner.published.push_back(envelope.clone());
        Self::deliver(&mut inner, envelope);

        Ok(id)
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut inner) = self.lock() {
            inner.subscribers.entry(topic).or_default().push(tx);
        }

        Subscription::new(topic, rx)
    }

    fn ack(&self, envelope: &Envelope) -> Result<(), BusError> {
        let mut inner = self.lock()?;
        inner
            .in_flight
            .remove(&envelope.message_id())
            .map(|_| ())
            .ok_or(BusError::UnknownMessage(envelope.message_id()))
    }

    fn nack(&self, envelope: Envelope) -> Result<(), BusError> {
        let mut inner = self.lock()?;
        inner.in_flight.remove(&envelope.message_id());

        if envelope.attempt() >= self.max_deliveries {
            warn!(
                message_id = %envelope.message_id(),
                topic = %envelope.topic(),
                attempt = envelope.attempt(),
                "message sent to dead-letter queue"
            );
            inner.dead_letters.push(DeadLetter {
                envelope,
                failed_at: Utc::now(),
            });
            return Ok(());
        }

        Self::deliver(&mut inner, envelope.redelivered());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = InMemoryEventBus::new();
        let mut stock = bus.subscribe(Topic::StockManagement);
        let mut receipts = bus.subscribe(Topic::ReceiptProcessing);

        bus.publish(Topic::StockManagement, json!({"item_id": "s1"})).unwrap();

        let env = stock.try_recv().unwrap();
        assert_eq!(env.payload()["item_id"], "s1");
        assert!(receipts.try_recv().is_err());
    }

    #[tokio::test]
    async fn ack_settles_the_message() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(Topic::QueryProcessing);

        bus.publish(Topic::QueryProcessing, json!({})).unwrap();
        assert_eq!(bus.in_flight(), 1);

        let env = sub.recv().await.unwrap();
        bus.ack(&env).unwrap();
        assert_eq!(bus.in_flight(), 0);
        assert!(matches!(bus.ack(&env), Err(BusError::UnknownMessage(_))));
    }

    #[tokio::test]
    async fn nack_redelivers_then_dead_letters() {
        let bus = InMemoryEventBus::new().with_max_deliveries(2);
        let mut sub = bus.subscribe(Topic::ReceiptProcessing);

        bus.publish(Topic::ReceiptProcessing, json!({"receipt_id": "r1"})).unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.attempt(), 1);
        bus.nack(first.clone()).unwrap();

        let second = sub.recv().await.unwrap();
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.message_id(), first.message_id());
        bus.nack(second).unwrap();

        assert!(sub.try_recv().is_err());
        assert_eq!(bus.dead_letters().len(), 1);
        assert_eq!(bus.in_flight(), 0);
    }

    #[test]
    fn publish_without_subscribers_is_logged_but_not_in_flight() {
        let bus = InMemoryEventBus::new();
        bus.publish(Topic::NotificationEvents, json!({"user_id": "u1"})).unwrap();

        assert_eq!(bus.published(Topic::NotificationEvents).len(), 1);
        assert_eq!(bus.in_flight(), 0);
    }

    #[test]
    fn published_log_keeps_only_the_most_recent_envelopes() {
        let bus = InMemoryEventBus::new();
        for n in 0..PUBLISHED_LOG_CAPACITY + 10 {
            bus.publish(Topic::NotificationEvents, json!({ "n": n })).unwrap();
        }

        let log = bus.published(Topic::NotificationEvents);
        assert_eq!(log.len(), PUBLISHED_LOG_CAPACITY);
        assert_eq!(log[0].payload()["n"], 10);
        assert_eq!(log[PUBLISHED_LOG_CAPACITY - 1].payload()["n"], PUBLISHED_LOG_CAPACITY + 9);
    }
}
