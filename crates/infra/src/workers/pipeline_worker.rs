use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use raseed_events::{Disposition, Envelope, EventBus, EventHandler, Subscription};

/// Upper bound on `max_concurrent`; larger values are clamped.
pub const MAX_CONCURRENT_LIMIT: usize = 1024;

/// Tuning for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Deliveries handled at once, within `1..=MAX_CONCURRENT_LIMIT`.
    pub max_concurrent: usize,
    /// Delay before the first redelivery; doubled per attempt.
    pub retry_base: Duration,
    /// Upper bound for any single retry delay.
    pub retry_max: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retry_base: Duration::from_millis(250),
            retry_max: Duration::from_secs(30),
        }
    }
}

impl WorkerOptions {
    /// Exponential backoff: `retry_base * 2^(attempt - 1)`, capped at `retry_max`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.retry_base
            .checked_mul(factor)
            .unwrap_or(self.retry_max)
            .min(self.retry_max)
    }
}

/// Snapshot of a worker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub acked: u64,
    pub retried: u64,
    /// Deliveries whose ack/nack the transport rejected.
    pub settle_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    acked: AtomicU64,
    retried: AtomicU64,
    settle_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            processed: self.processed.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            settle_failures: self.settle_failures.load(Ordering::Relaxed),
        }
    }
}

/// Handle to control and join a running worker.
///
/// Dropping the handle without calling [`WorkerHandle::shutdown`] also stops the
/// worker, but does not wait for in-flight deliveries.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Stop taking deliveries, wait for in-flight ones to settle, then return the
    /// final counters.
    pub async fn shutdown(self) -> WorkerStats {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            warn!(worker = self.name, error = %e, "worker task ended abnormally");
        }
        self.counters.snapshot()
    }
}

/// Pipeline worker loop.
///
/// - Subscribes the handler to its topic (before `spawn` returns, so nothing
///   published afterwards is missed)
/// - Runs up to `max_concurrent` deliveries at once
/// - Acks on [`Disposition::Ack`]; on [`Disposition::Retry`] waits out the backoff
///   for the delivery's attempt, then nacks so the transport redelivers or
///   dead-letters it
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct PipelineWorker;

impl PipelineWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(
        handler: Arc<dyn EventHandler>,
        bus: Arc<dyn EventBus>,
        options: WorkerOptions,
    ) -> WorkerHandle {
        let name = handler.name();
        let subscription = bus.subscribe(handler.topic());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            handler,
            bus,
            options,
            counters: counters.clone(),
        };
        let join = tokio::spawn(worker.run(subscription, shutdown_rx));

        WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join,
            counters,
        }
    }
}

#[derive(Clone)]
struct Worker {
    handler: Arc<dyn EventHandler>,
    bus: Arc<dyn EventBus>,
    options: WorkerOptions,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, mut subscription: Subscription, mut shutdown: oneshot::Receiver<()>) {
        let name = self.handler.name();
        let capacity = self.options.max_concurrent.clamp(1, MAX_CONCURRENT_LIMIT) as u32;
        let permits = Arc::new(Semaphore::new(capacity as usize));

        info!(worker = name, topic = %subscription.topic(), max_concurrent = capacity, "worker started");

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let envelope = tokio::select! {
                _ = &mut shutdown => break,
                next = subscription.recv() => match next {
                    Some(envelope) => envelope,
                    None => {
                        info!(worker = name, "subscription closed");
                        break;
                    }
                },
            };

            tokio::spawn(self.clone().deliver(envelope, permit));
        }

        // Every permit back means every spawned delivery has settled.
        let _ = permits.acquire_many(capacity).await;
        info!(worker = name, stats = ?self.counters.snapshot(), "worker stopped");
    }

    async fn deliver(self, envelope: Envelope, _permit: OwnedSemaphorePermit) {
        let name = self.handler.name();
        Counters::bump(&self.counters.processed);

        match self.handler.handle(&envelope).await {
            Disposition::Ack => {
                Counters::bump(&self.counters.acked);
                if let Err(e) = self.bus.ack(&envelope) {
                    Counters::bump(&self.counters.settle_failures);
                    warn!(worker = name, message_id = %envelope.message_id(), error = %e, "ack failed");
                }
            }
            Disposition::Retry => {
                Counters::bump(&self.counters.retried);
                let delay = self.options.retry_delay(envelope.attempt());
                debug!(
                    worker = name,
                    message_id = %envelope.message_id(),
                    attempt = envelope.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "backing off before redelivery"
                );
                tokio::time::sleep(delay).await;

                let message_id = envelope.message_id();
                if let Err(e) = self.bus.nack(envelope) {
                    Counters::bump(&self.counters.settle_failures);
                    warn!(worker = name, %message_id, error = %e, "nack failed");
                }
            }
        }
    }
}
