//! Per-item token ceiling.
//!
//! No single item may take more than a fixed fraction of its category's
//! budget. Oversized items are cut and tagged with a marker saying where
//! the full version lives.

use engram_core::candidate::Locator;
use serde::{Deserialize, Serialize};

use crate::token::{CHARS_PER_TOKEN, char_count, estimate_tokens, truncate_to_chars, truncate_to_tokens};

/// Result of capping one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CappedItem {
    pub content: String,
    /// True iff `content` differs from the input
    pub truncated: bool,
}

/// Token ceiling for one item: `floor(fraction * category_budget)`.
pub fn item_ceiling(category_budget: usize, max_item_fraction: f64) -> usize {
    (category_budget as f64 * max_item_fraction).floor().max(0.0) as usize
}

/// Marker appended to a cut item, including the leading ellipsis.
pub fn truncation_marker(locator: &Locator) -> String {
    let note = match locator {
        Locator::Code {
            file_path,
            start_line,
        } => format!("\n\n*(truncated, see full at {file_path}:{start_line})*"),
        Locator::Experience { id } => format!("\n\n*(truncated, full experience ID: {id})*"),
        _ => "\n\n*(truncated)*".to_string(),
    };
    format!("...{note}")
}

/// Cap `content` to its share of `category_budget`.
///
/// The marker counts against the ceiling. When the ceiling cannot even
/// hold the marker, the content is hard-cut with no marker.
pub fn cap_item_tokens(
    content: &str,
    category_budget: usize,
    locator: &Locator,
    max_item_fraction: f64,
) -> CappedItem {
    let ceiling = item_ceiling(category_budget, max_item_fraction);

    if estimate_tokens(content) <= ceiling {
        return CappedItem {
            content: content.to_string(),
            truncated: false,
        };
    }

    let marker = truncation_marker(locator);
    let ceiling_chars = ceiling.saturating_mul(CHARS_PER_TOKEN);
    let marker_chars = char_count(&marker);

    let capped = if marker_chars < ceiling_chars {
        let body = truncate_to_chars(content, ceiling_chars - marker_chars);
        format!("{body}{marker}")
    } else {
        truncate_to_tokens(content, ceiling).to_string()
    };

    let truncated = capped != content;
    CappedItem {
        content: capped,
        truncated,
    }
}
