//! Event transport mechanics: topics, envelopes, pub/sub and handler contracts.
//!
//! Domain crates define their own payloads by implementing [`Event`]; this crate
//! stays agnostic of receipts, stock or bills.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod notification;
pub mod topic;

pub use bus::{BusError, EventBus, Subscription, publish_event};
pub use envelope::{Envelope, MessageId};
pub use event::Event;
pub use handler::{Disposition, EventHandler};
pub use in_memory_bus::{DeadLetter, InMemoryEventBus, PUBLISHED_LOG_CAPACITY};
pub use notification::{NotificationKind, NotificationRequested};
pub use topic::Topic;
