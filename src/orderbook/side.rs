//! One side of the book.
//!
//! Levels are kept in a `BTreeMap` sorted ascending by price. Bids read it
//! back to front and asks front to back, so both sides iterate best-first
//! without a second map or a reversed key type.

use std::collections::btree_map;
use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::types::{Price, PriceLevel, Quantity};

/// Which side of the book a [`Side`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideKind {
    /// Buy orders, best = highest price
    Bid,
    /// Sell orders, best = lowest price
    Ask,
}

/// Price-ordered levels for one side of the book
///
/// Invariant: every stored quantity is strictly positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    kind: SideKind,
    levels: BTreeMap<Price, Quantity>,
}

impl Side {
    /// Create an empty side
    #[must_use]
    pub fn new(kind: SideKind) -> Self {
        Self {
            kind,
            levels: BTreeMap::new(),
        }
    }

    /// Which side this is
    #[must_use]
    pub const fn kind(&self) -> SideKind {
        self.kind
    }

    /// Insert, overwrite or remove the level at `price`
    ///
    /// A zero (or negative) quantity removes the level; removing an absent
    /// level is a no-op.
    pub fn upsert(&mut self, price: Price, quantity: Quantity) {
        if quantity <= Decimal::ZERO {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, quantity);
        }
    }

    /// Apply a batch of level changes in order
    pub fn apply(&mut self, changes: &[PriceLevel]) {
        for level in changes {
            self.upsert(level.price, level.quantity);
        }
    }

    /// Quantity at `price`, if the level exists
    #[must_use]
    pub fn get(&self, price: &Price) -> Option<Quantity> {
        self.levels.get(price).copied()
    }

    /// Best level (highest bid / lowest ask)
    #[must_use]
    pub fn best(&self) -> Option<(Price, Quantity)> {
        let entry = match self.kind {
            SideKind::Bid => self.levels.last_key_value(),
            SideKind::Ask => self.levels.first_key_value(),
        };
        entry.map(|(&p, &q)| (p, q))
    }

    /// All levels, best first
    pub fn iter(&self) -> Levels<'_> {
        Levels {
            inner: self.levels.iter(),
            kind: self.kind,
            remaining: usize::MAX,
        }
    }

    /// Up to `n` levels, best first
    ///
    /// The iterator is lazy and borrows the side; call again to restart.
    pub fn top_n(&self, n: usize) -> Levels<'_> {
        Levels {
            inner: self.levels.iter(),
            kind: self.kind,
            remaining: n,
        }
    }

    /// Number of price levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the side has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Sum of all resting quantities
    #[must_use]
    pub fn total_quantity(&self) -> Quantity {
        self.levels.values().sum()
    }

    /// Remove every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

/// Best-first iterator over a [`Side`]
#[derive(Debug, Clone)]
pub struct Levels<'a> {
    inner: btree_map::Iter<'a, Price, Quantity>,
    kind: SideKind,
    remaining: usize,
}

impl Iterator for Levels<'_> {
    type Item = (Price, Quantity);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = match self.kind {
            SideKind::Bid => self.inner.next_back(),
            SideKind::Ask => self.inner.next(),
        };
        self.remaining -= 1;
        entry.map(|(&p, &q)| (p, q))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.inner.len().min(self.remaining);
        (len, Some(len))
    }
}

impl ExactSizeIterator for Levels<'_> {}
