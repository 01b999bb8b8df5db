//! Durable event bus backends.
//!
//! The transport contract and the in-memory bus live in `raseed-events`; this module
//! provides Redis-backed implementations behind the `redis` feature.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsEventBus;
