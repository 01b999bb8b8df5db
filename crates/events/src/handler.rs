use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::topic::Topic;

/// How a consumer settles a delivery with the transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Processed, or failed in a way retrying cannot fix. Do not redeliver.
    Ack,
    /// Failed transiently. Redeliver later.
    Retry,
}

/// Consumes envelopes of a single topic (event handler abstraction).
///
/// Handlers are invoked by workers as independent units of work; invocations for
/// different envelopes may run concurrently, so implementations must not rely on
/// in-process shared state for coordination.
///
/// ## Idempotency
///
/// Delivery is at-least-once. Handling the same envelope twice must converge on the
/// same stored state (deterministic keys, upserts) or accept documented duplicates.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and worker thread names.
    fn name(&self) -> &'static str;

    /// Topic this handler consumes.
    fn topic(&self) -> Topic;

    /// Process one delivery and decide its settlement.
    async fn handle(&self, envelope: &Envelope) -> Disposition;
}
