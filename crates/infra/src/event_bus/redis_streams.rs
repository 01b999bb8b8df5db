//! Redis Streams event bus (durable, at-least-once delivery).
//!
//! - **Streams**: one per topic, `<prefix>:<topic>` (e.g. `raseed:events:receipt-processing`)
//! - **Consumer group**: one per stream; each worker process is a named consumer
//! - **Settlement**: entries stay pending until `ack` (`XACK`). A consumer restarted
//!   under the same name replays its own pending entries before reading new ones
//! - **Redelivery**: `nack` appends the envelope again with `attempt + 1` and acks
//!   the old entry; at `max_deliveries` it goes to `<stream>:dlq` instead
//! - **External producers** may `XADD` a bare `payload` field; it is wrapped in a
//!   fresh envelope when read
//!
//! Publish and settlement run on a shared blocking connection. Each subscription
//! gets a reader thread with its own connection that forwards envelopes into the
//! subscription channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{Commands, Connection, RedisError, RedisResult};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, instrument, warn};

use raseed_events::{BusError, Envelope, EventBus, MessageId, Subscription, Topic};

pub const DEFAULT_KEY_PREFIX: &str = "raseed:events";
pub const DEFAULT_GROUP: &str = "raseed-pipelines";
pub const DEFAULT_CONSUMER: &str = "raseed-worker";

const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Approximate number of entries kept per stream (`XADD MAXLEN ~`).
const STREAM_MAXLEN: usize = 100_000;

const READ_COUNT: usize = 16;
const READ_BLOCK: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const ENVELOPE_FIELD: &str = "envelope";
const PAYLOAD_FIELD: &str = "payload";

pub fn stream_key(prefix: &str, topic: Topic) -> String {
    format!("{prefix}:{topic}")
}

pub fn dead_letter_key(stream: &str) -> String {
    format!("{stream}:dlq")
}

/// Where a delivery that was read from Redis currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    stream: String,
    entry_id: String,
}

type PendingEntries = Arc<Mutex<HashMap<MessageId, PendingEntry>>>;

fn lock_pending(pending: &PendingEntries) -> MutexGuard<'_, HashMap<MessageId, PendingEntry>> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}

fn unavailable(err: RedisError) -> BusError {
    BusError::Unavailable(format!("redis: {err}"))
}

pub struct RedisStreamsEventBus {
    client: redis::Client,
    conn: Mutex<Option<Connection>>,
    key_prefix: String,
    group: String,
    consumer: String,
    max_deliveries: u32,
    pending: PendingEntries,
}

impl RedisStreamsEventBus {
    /// Parse `redis_url`; no connection is made until the first command.
    pub fn new(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url).map_err(unavailable)?;

        Ok(Self {
            client,
            conn: Mutex::new(None),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            group: DEFAULT_GROUP.to_string(),
            consumer: DEFAULT_CONSUMER.to_string(),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            pending: Arc::default(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Consumer name within the group. Keep it stable across restarts so pending
    /// entries are replayed.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    pub fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }

    pub fn stream_for(&self, topic: Topic) -> String {
        stream_key(&self.key_prefix, topic)
    }

    /// Round-trip a `PING`.
    pub fn check_connection(&self) -> Result<(), BusError> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))
            .map(|_| ())
    }

    /// Run `op` on the shared connection, reconnecting after IO failures.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T, BusError> {
        let mut slot = self
            .conn
            .lock()
            .map_err(|_| BusError::Unavailable("redis connection lock poisoned".to_string()))?;

        if slot.is_none() {
            *slot = Some(self.client.get_connection().map_err(unavailable)?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(BusError::Unavailable("no redis connection".to_string()));
        };

        op(conn).map_err(|e| {
            if e.is_io_error() || e.is_connection_dropped() {
                *slot = None;
            }
            unavailable(e)
        })
    }

    fn append(&self, stream: &str, envelope: &Envelope) -> Result<(), BusError> {
        let body = serde_json::to_string(envelope)?;
        self.with_connection(|conn| -> RedisResult<String> {
            conn.xadd_maxlen(
                stream,
                StreamMaxlen::Approx(STREAM_MAXLEN),
                "*",
                &[(ENVELOPE_FIELD, body.as_str())],
            )
        })?;
        Ok(())
    }

    fn append_dead_letter(
        &self,
        stream: &str,
        envelope: &Envelope,
        entry_id: &str,
    ) -> Result<(), BusError> {
        let body = serde_json::to_string(envelope)?;
        let failed_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| -> RedisResult<String> {
            conn.xadd(
                dead_letter_key(stream),
                "*",
                &[
                    (ENVELOPE_FIELD, body.as_str()),
                    ("entry_id", entry_id),
                    ("failed_at", failed_at.as_str()),
                ],
            )
        })?;
        Ok(())
    }

    fn pending_entry(&self, message_id: MessageId) -> Result<PendingEntry, BusError> {
        lock_pending(&self.pending)
            .get(&message_id)
            .cloned()
            .ok_or(BusError::UnknownMessage(message_id))
    }

    fn settle_entry(&self, message_id: MessageId, entry: &PendingEntry) -> Result<(), BusError> {
        self.with_connection(|conn| -> RedisResult<u64> {
            conn.xack(&entry.stream, &self.group, &[&entry.entry_id])
        })?;
        lock_pending(&self.pending).remove(&message_id);
        Ok(())
    }
}

impl core::fmt::Debug for RedisStreamsEventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsEventBus")
            .field("key_prefix", &self.key_prefix)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("max_deliveries", &self.max_deliveries)
            .finish_non_exhaustive()
    }
}

/// What `nack` does with a delivery.
#[derive(Debug, Clone, PartialEq)]
enum Redelivery {
    Retry(Envelope),
    DeadLetter(Envelope),
}

fn redelivery(envelope: Envelope, max_deliveries: u32) -> Redelivery {
    if envelope.attempt() >= max_deliveries {
        Redelivery::DeadLetter(envelope)
    } else {
        Redelivery::Retry(envelope.redelivered())
    }
}

/// Turn the fields of one stream entry into an envelope for `topic`.
fn decode_entry(
    topic: Topic,
    envelope: Option<String>,
    payload: Option<String>,
) -> Result<Envelope, String> {
    if let Some(raw) = envelope {
        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|e| format!("invalid envelope: {e}"))?;
        if envelope.topic() != topic {
            return Err(format!("{} envelope on the {topic} stream", envelope.topic()));
        }
        return Ok(envelope);
    }

    match payload {
        Some(raw) => serde_json::from_str(&raw)
            .map(|payload| Envelope::new(topic, payload))
            .map_err(|e| format!("invalid payload: {e}")),
        None => Err(format!("entry has neither `{ENVELOPE_FIELD}` nor `{PAYLOAD_FIELD}`")),
    }
}

impl EventBus for RedisStreamsEventBus {
    #[instrument(skip_all, fields(topic = %topic), err)]
    fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<MessageId, BusError> {
        let envelope = Envelope::new(topic, payload);
        self.append(&self.stream_for(topic), &envelope)?;
        Ok(envelope.message_id())
    }

    fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = StreamReader {
            client: self.client.clone(),
            topic,
            stream: self.stream_for(topic),
            group: self.group.clone(),
            consumer: self.consumer.clone(),
            pending: self.pending.clone(),
            tx,
        };

        // A reader that fails to start drops its sender, which closes the subscription.
        if let Err(e) = thread::Builder::new()
            .name(format!("redis-{topic}"))
            .spawn(move || reader.run())
        {
            error!(%topic, error = %e, "failed to start redis stream reader");
        }

        Subscription::new(topic, rx)
    }

    fn ack(&self, envelope: &Envelope) -> Result<(), BusError> {
        let message_id = envelope.message_id();
        let entry = self.pending_entry(message_id)?;
        self.settle_entry(message_id, &entry)
    }

    fn nack(&self, envelope: Envelope) -> Result<(), BusError> {
        let message_id = envelope.message_id();
        let entry = self.pending_entry(message_id)?;

        match redelivery(envelope, self.max_deliveries) {
            Redelivery::Retry(next) => self.append(&entry.stream, &next)?,
            Redelivery::DeadLetter(last) => {
                warn!(
                    %message_id,
                    topic = %last.topic(),
                    attempt = last.attempt(),
                    "message sent to dead-letter stream"
                );
                self.append_dead_letter(&entry.stream, &last, &entry.entry_id)?;
            }
        }

        self.settle_entry(message_id, &entry)
    }
}

/// Background reader for one subscription.
struct StreamReader {
    client: redis::Client,
    topic: Topic,
    stream: String,
    group: String,
    consumer: String,
    pending: PendingEntries,
    tx: UnboundedSender<Envelope>,
}

impl StreamReader {
    fn run(self) {
        info!(stream = %self.stream, group = %self.group, consumer = %self.consumer, "redis stream reader started");

        let mut conn: Option<Connection> = None;
        // Start at this consumer's own pending entries; `>` once they are replayed.
        let mut cursor = "0".to_string();

        while !self.tx.is_closed() {
            if conn.is_none() {
                match self.connect() {
                    Ok(fresh) => conn = Some(fresh),
                    Err(e) => {
                        warn!(stream = %self.stream, error = %e, "redis unavailable; reconnecting");
                        thread::sleep(RECONNECT_DELAY);
                        continue;
                    }
                }
            }
            let Some(active) = conn.as_mut() else {
                continue;
            };

            let entries = match self.read(active, &cursor) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(stream = %self.stream, error = %e, "stream read failed; reconnecting");
                    conn = None;
                    thread::sleep(RECONNECT_DELAY);
                    continue;
                }
            };

            if cursor != ">" {
                match entries.last() {
                    Some(last) => cursor = last.id.clone(),
                    None => cursor = ">".to_string(),
                }
            }

            for entry in entries {
                if !self.forward(active, entry) {
                    break;
                }
            }
        }

        debug!(stream = %self.stream, "subscription dropped; reader stopped");
    }

    fn connect(&self) -> RedisResult<Connection> {
        let mut conn = self.client.get_connection()?;
        let created: RedisResult<()> = conn.xgroup_create_mkstream(&self.stream, &self.group, "0");
        match created {
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            other => other?,
        }
        Ok(conn)
    }

    fn read(&self, conn: &mut Connection, cursor: &str) -> RedisResult<Vec<StreamId>> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(READ_COUNT)
            .block(READ_BLOCK.as_millis() as usize);
        let reply: Option<StreamReadReply> =
            conn.xread_options(&[self.stream.as_str()], &[cursor], &options)?;

        Ok(reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .collect())
    }

    /// Returns `false` once the subscription is gone.
    fn forward(&self, conn: &mut Connection, entry: StreamId) -> bool {
        let envelope = entry.get::<String>(ENVELOPE_FIELD);
        let payload = entry.get::<String>(PAYLOAD_FIELD);

        match decode_entry(self.topic, envelope.clone(), payload.clone()) {
            Ok(envelope) => {
                let message_id = envelope.message_id();
                lock_pending(&self.pending).insert(
                    message_id,
                    PendingEntry {
                        stream: self.stream.clone(),
                        entry_id: entry.id.clone(),
                    },
                );
                if self.tx.send(envelope).is_err() {
                    lock_pending(&self.pending).remove(&message_id);
                    return false;
                }
                true
            }
            Err(reason) => {
                warn!(stream = %self.stream, entry_id = %entry.id, %reason, "undecodable stream entry; dead-lettering");
                let raw = envelope.or(payload).unwrap_or_default();
                if let Err(e) = self.dead_letter_raw(conn, &entry.id, &raw, &reason) {
                    error!(stream = %self.stream, entry_id = %entry.id, error = %e, "failed to dead-letter entry");
                }
                true
            }
        }
    }

    fn dead_letter_raw(
        &self,
        conn: &mut Connection,
        entry_id: &str,
        raw: &str,
        reason: &str,
    ) -> RedisResult<()> {
        let failed_at = Utc::now().to_rfc3339();
        let _: String = conn.xadd(
            dead_letter_key(&self.stream),
            "*",
            &[
                ("raw", raw),
                ("reason", reason),
                ("entry_id", entry_id),
                ("failed_at", failed_at.as_str()),
            ],
        )?;
        let _: u64 = conn.xack(&self.stream, &self.group, &[entry_id])?;
        Ok(())
    }
}
