//! Top-of-book copy-out and text rendering.

use std::fmt;

use crate::types::{PriceLevel, UpdateId};

use super::OrderBook;

/// Owned top-N view of a book
///
/// Produced under a read lock and then released, so it can be handed to a
/// display thread or another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookView {
    /// Symbol of the book
    pub symbol: String,
    /// Cursor the view is consistent with
    pub last_update_id: UpdateId,
    /// Best bids, highest first
    pub bids: Vec<PriceLevel>,
    /// Best asks, lowest first
    pub asks: Vec<PriceLevel>,
}

impl BookView {
    /// Best bid in the view
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    /// Best ask in the view
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }
}

impl fmt::Display for BookView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} @ {}", self.symbol, self.last_update_id)?;
        writeln!(f, "Top {} Bids:", self.bids.len())?;
        for level in &self.bids {
            writeln!(f, "{} : {}", level.price.normalize(), level.quantity.normalize())?;
        }
        writeln!(f, "Top {} Asks:", self.asks.len())?;
        for level in &self.asks {
            writeln!(f, "{} : {}", level.price.normalize(), level.quantity.normalize())?;
        }
        Ok(())
    }
}

/// Format the top `n` levels of each side of `book`
#[must_use]
pub fn render(book: &OrderBook, n: usize) -> String {
    book.snapshot_view(n).to_string()
}
