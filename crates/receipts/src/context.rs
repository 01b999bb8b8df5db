//! Receipt history summaries embedded in query prompts.

use std::fmt::Write as _;

use crate::receipt::Receipt;

/// Upper bound on receipts summarized into one prompt.
pub const CONTEXT_RECEIPT_LIMIT: usize = 10;

/// The `limit` most recent receipts, newest first.
pub fn recent_receipts(mut receipts: Vec<Receipt>, limit: usize) -> Vec<Receipt> {
    receipts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    receipts.truncate(limit);
    receipts
}

/// Render receipts as the plain-text block the query prompt embeds.
///
/// ```text
/// Recent Receipts:
/// - Pizza Palace: $45.99 on 2026-10-18
///   * Margherita Pizza (food)
/// ```
pub fn receipt_history_context(receipts: &[Receipt]) -> String {
    if receipts.is_empty() {
        return "No receipt history available.".to_string();
    }

    let mut out = String::from("Recent Receipts:\n");
    for receipt in receipts {
        let store = if receipt.store_name.is_empty() {
            "Unknown store"
        } else {
            receipt.store_name.as_str()
        };
        let date = receipt
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown date".to_string());

        let _ = writeln!(out, "- {store}: ${:.2} on {date}", receipt.total_amount);
        for item in &receipt.items {
            let _ = writeln!(out, "  * {} ({})", item.name, item.category);
        }
    }
    out
}
