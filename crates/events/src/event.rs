use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::topic::Topic;

/// A typed event payload bound to a single topic.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **JSON on the wire** (the transport only ever sees `serde_json::Value`)
/// - **topic-scoped** (exactly one pipeline consumes each topic)
pub trait Event: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Topic this event is published on.
    const TOPIC: Topic;

    /// Stable event name used in logs (e.g. "receipt.uploaded").
    fn event_type(&self) -> &'static str;
}
