//! Infrastructure layer: document stores, event bus backends, pipelines, workers and
//! configuration.
//!
//! Domain crates own the record shapes and events; this crate wires them to storage,
//! the generative model and the bus.

pub mod config;
pub mod event_bus;
pub mod pipelines;
pub mod record_store;
pub mod workers;
