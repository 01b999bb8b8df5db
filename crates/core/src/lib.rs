//! `raseed-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! record identifiers, the entity marker and the domain error model.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BillId, OwnerId, PassId, QueryId, ReceiptId, StockItemId};
