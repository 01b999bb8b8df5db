//! `raseed-bills`
//!
//! **Responsibility:** bills pulled from third-party delivery services and the
//! normalization of vendor payloads into one bill shape.
//!
//! Vendor integrations are fixtures for now; the [`BillSource`] seam is where a
//! live client would plug in.

pub mod bill;
pub mod event;
pub mod vendors;

pub use bill::{BillItem, DeliveryStatus, ServiceTag, ThirdPartyBill};
pub use event::{IntegrationAction, ThirdPartyRequested};
pub use vendors::{BillSource, FixtureBillSource};
