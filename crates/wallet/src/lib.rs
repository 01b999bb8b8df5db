//! `raseed-wallet`
//!
//! **Responsibility:** wallet-pass artifacts derived by the pipelines.
//!
//! Passes are never created by end users. Their ids are derived deterministically
//! from the source record, which is what makes re-processing an event an update
//! rather than a duplicate.

pub mod pass;
pub mod pass_id;

pub use pass::{PassKind, WalletPass};
pub use pass_id::{bill_pass_id, integration_pass_id, query_pass_id, receipt_pass_id, stock_pass_id};
