//! Wire and value types for Binance depth data.
//!
//! - [`messages`] - REST snapshot and WebSocket diff payloads
//!
//! The numeric aliases below are used throughout the crate.

pub mod messages;

use rust_decimal::Decimal;

pub use messages::{DepthSnapshot, DepthUpdateMsg, UpdateEvent};

/// Price of a level
///
/// Binance sends prices as decimal strings (`"4.00000000"`). Using `Decimal`
/// instead of `f64` gives:
/// - Exact comparisons (`"4.0"` and `"4.00000000"` are the same level)
/// - A total order, so prices can key a `BTreeMap`
pub type Price = Decimal;

/// Quantity resting at a price level
///
/// Zero is a tombstone meaning "remove this level".
pub type Quantity = Decimal;

/// Exchange-side update identifier (the synchronization cursor)
pub type UpdateId = u64;

/// Timestamp in milliseconds since Unix epoch
pub type TimestampMs = u64;

/// A single `(price, quantity)` level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel {
    /// Level price
    pub price: Price,
    /// Quantity at this price (zero means remove)
    pub quantity: Quantity,
}

impl PriceLevel {
    /// Create a new price level
    #[must_use]
    pub const fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }

    /// Whether this level is a removal marker
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }
}

impl From<(Price, Quantity)> for PriceLevel {
    fn from((price, quantity): (Price, Quantity)) -> Self {
        Self { price, quantity }
    }
}

impl From<PriceLevel> for (Price, Quantity) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.quantity)
    }
}
