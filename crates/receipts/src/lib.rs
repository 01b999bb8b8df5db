//! `raseed-receipts`
//!
//! **Responsibility:** receipts, user queries, and the model output schemas the
//! pipelines reconcile into them.

pub mod context;
pub mod event;
pub mod query;
pub mod receipt;

pub use context::{CONTEXT_RECEIPT_LIMIT, receipt_history_context, recent_receipts};
pub use event::{QuerySubmitted, ReceiptUploaded};
pub use query::{Intent, Query, QueryAnswer};
pub use receipt::{ExtractedReceipt, Item, Location, Receipt, ReceiptStatus};
