//! Core orderbook data structure.
//!
//! Two [`Side`]s plus the last-applied update id. The book knows nothing about
//! continuity; deciding which events may be applied is the reconciler's job.

use rust_decimal::Decimal;

use crate::types::messages::UpdateEvent;
use crate::types::{Price, PriceLevel, Quantity, UpdateId};

use super::side::{Levels, Side, SideKind};
use super::view::BookView;

/// Local mirror of one symbol's order book.
///
/// # Design Decisions
///
/// 1. **Decimal prices**: Levels are keyed by `rust_decimal::Decimal`, so
///    `"100.0"` and `"100.00000000"` land on the same level and ordering is
///    exact.
///
/// 2. **BTreeMap per side**: O(log n) upsert and delete, best level in
///    O(log n) via `first_key_value` / `last_key_value`, ordered iteration for
///    top-N queries.
///
/// 3. **Cursor**: `last_update_id` only moves forward.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. The
/// reconciler wraps it in a `parking_lot::RwLock`.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: Side,
    asks: Side,
    last_update_id: UpdateId,
}

impl OrderBook {
    /// Create a new empty orderbook for the given symbol
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Side::new(SideKind::Bid),
            asks: Side::new(SideKind::Ask),
            last_update_id: 0,
        }
    }

    /// Build a book from snapshot levels
    ///
    /// Zero-quantity levels in the input are skipped.
    #[must_use]
    pub fn from_levels(
        symbol: impl Into<String>,
        last_update_id: UpdateId,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
    ) -> Self {
        let mut book = Self::new(symbol);
        book.apply_delta(bids, asks);
        book.last_update_id = last_update_id;
        book
    }

    /// Get the symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the last applied update id
    #[must_use]
    pub const fn last_update_id(&self) -> UpdateId {
        self.last_update_id
    }

    /// Apply level changes to both sides
    pub fn apply_delta(&mut self, bid_changes: &[PriceLevel], ask_changes: &[PriceLevel]) {
        self.bids.apply(bid_changes);
        self.asks.apply(ask_changes);
    }

    /// Apply an update event and advance the cursor to its last id
    ///
    /// The cursor never moves backwards, even if called with an older event.
    pub fn apply_event(&mut self, event: &UpdateEvent) {
        self.apply_delta(&event.bid_changes, &event.ask_changes);
        self.last_update_id = self.last_update_id.max(event.last_update_id);
    }

    /// Get the bid side
    #[must_use]
    pub fn bids(&self) -> &Side {
        &self.bids
    }

    /// Get the ask side
    #[must_use]
    pub fn asks(&self) -> &Side {
        &self.asks
    }

    /// Get the best bid (highest price)
    ///
    /// Returns `(price, quantity)` or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.best()
    }

    /// Get the best ask (lowest price)
    ///
    /// Returns `(price, quantity)` or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.best()
    }

    /// Get the mid price
    ///
    /// Returns the average of best bid and best ask, or `None` if either is missing.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get the spread (best ask minus best bid)
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    /// Check if the book is crossed (best bid >= best ask)
    ///
    /// Can happen transiently during a burst of updates; not validated.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Get the top N bid levels, best first
    pub fn top_bids(&self, n: usize) -> Levels<'_> {
        self.bids.top_n(n)
    }

    /// Get the top N ask levels, best first
    pub fn top_asks(&self, n: usize) -> Levels<'_> {
        self.asks.top_n(n)
    }

    /// Copy out the top `n` levels of each side
    #[must_use]
    pub fn snapshot_view(&self, n: usize) -> BookView {
        BookView {
            symbol: self.symbol.clone(),
            last_update_id: self.last_update_id,
            bids: self.bids.top_n(n).map(PriceLevel::from).collect(),
            asks: self.asks.top_n(n).map(PriceLevel::from).collect(),
        }
    }

    /// Get total bid quantity
    #[must_use]
    pub fn total_bid_quantity(&self) -> Quantity {
        self.bids.total_quantity()
    }

    /// Get total ask quantity
    #[must_use]
    pub fn total_ask_quantity(&self) -> Quantity {
        self.asks.total_quantity()
    }

    /// Check if the orderbook is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get the number of price levels `(bids, asks)`
    #[must_use]
    pub fn num_levels(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, quantity: Decimal) -> PriceLevel {
        PriceLevel::new(price, quantity)
    }

    #[test]
    fn test_new_orderbook() {
        let book = OrderBook::new("BTCUSDT");
        assert_eq!(book.symbol(), "BTCUSDT");
        assert!(book.is_empty());
        assert_eq!(book.last_update_id(), 0);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_from_levels_skips_zero() {
        let book = OrderBook::from_levels(
            "BTCUSDT",
            1000,
            &[level(dec!(100), dec!(5)), level(dec!(99), dec!(0))],
            &[level(dec!(101), dec!(2))],
        );

        assert_eq!(book.last_update_id(), 1000);
        assert_eq!(book.num_levels(), (1, 1));
        assert_eq!(book.best_bid(), Some((dec!(100), dec!(5))));
        assert_eq!(book.best_ask(), Some((dec!(101), dec!(2))));
    }

    #[test]
    fn test_apply_event_advances_cursor() {
        let mut book = OrderBook::from_levels("BTCUSDT", 1000, &[level(dec!(100), dec!(5))], &[]);

        let event = UpdateEvent::new(1001, 1002).with_bid(dec!(100), dec!(3));
        book.apply_event(&event);

        assert_eq!(book.last_update_id(), 1002);
        assert_eq!(book.best_bid(), Some((dec!(100), dec!(3))));
    }

    #[test]
    fn test_cursor_never_decreases() {
        let mut book = OrderBook::from_levels("BTCUSDT", 1000, &[], &[]);
        book.apply_event(&UpdateEvent::new(10, 20));
        assert_eq!(book.last_update_id(), 1000);
    }

    #[test]
    fn test_delete_absent_level_is_noop() {
        let mut book = OrderBook::from_levels("BTCUSDT", 1, &[level(dec!(100), dec!(5))], &[]);
        let before = book.snapshot_view(10);

        book.apply_delta(&[level(dec!(42), dec!(0))], &[level(dec!(43), dec!(0))]);

        let after = book.snapshot_view(10);
        assert_eq!(before, after);
    }

    #[test]
    fn test_mid_price_and_spread() {
        let book = OrderBook::from_levels(
            "TEST",
            1,
            &[level(dec!(45), dec!(100))],
            &[level(dec!(55), dec!(100))],
        );

        assert_eq!(book.mid_price(), Some(dec!(50)));
        assert_eq!(book.spread(), Some(dec!(10)));
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_crossed_book() {
        let book = OrderBook::from_levels(
            "TEST",
            1,
            &[level(dec!(55), dec!(1))],
            &[level(dec!(50), dec!(1))],
        );

        assert!(book.is_crossed());
    }

    #[test]
    fn test_snapshot_view_is_independent_copy() {
        let mut book = OrderBook::from_levels("TEST", 7, &[level(dec!(10), dec!(1))], &[]);
        let view = book.snapshot_view(5);

        book.apply_delta(&[level(dec!(10), dec!(0))], &[]);

        assert_eq!(view.last_update_id, 7);
        assert_eq!(view.bids, vec![level(dec!(10), dec!(1))]);
        assert!(book.is_empty());
    }

    #[test]
    fn test_top_levels() {
        let book = OrderBook::from_levels(
            "TEST",
            1,
            &[
                level(dec!(45), dec!(100)),
                level(dec!(44), dec!(200)),
                level(dec!(43), dec!(300)),
            ],
            &[],
        );

        let top: Vec<_> = book.top_bids(2).collect();
        assert_eq!(top, vec![(dec!(45), dec!(100)), (dec!(44), dec!(200))]);
        assert_eq!(book.total_bid_quantity(), dec!(600));
        assert_eq!(book.total_ask_quantity(), dec!(0));
    }
}
