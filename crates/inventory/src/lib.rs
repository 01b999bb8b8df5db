//! `raseed-inventory`
//!
//! **Responsibility:** household stock items and their freshness.
//!
//! Freshness is a pure function of the expiry date and the current instant;
//! the request layer recomputes it on every mutation and the stock pipeline
//! trusts what it reads back.

pub mod category;
pub mod event;
pub mod item;

pub use category::PerishableCategory;
pub use event::{StockAction, StockMutated};
pub use item::{EXPIRING_SOON_WINDOW_DAYS, FreshnessStatus, StockItem};
