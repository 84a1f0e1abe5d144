//! Local order book and its synchronization state machine.
//!
//! This module provides:
//!
//! - [`Side`] - price-ordered levels for bids or asks
//! - [`OrderBook`] - both sides plus the last applied update id
//! - [`Reconciler`] - decides which stream events may touch the book
//! - [`BookView`] / [`render`] - top-N copy-out for display
//! - [`BookRegistry`] - look up several symbols' books
//!
//! # Example
//!
//! ```rust
//! use binance_depthbook::orderbook::{EventOutcome, OrderBook, Reconciler};
//! use binance_depthbook::types::{PriceLevel, UpdateEvent};
//! use rust_decimal::Decimal;
//!
//! let mut reconciler = Reconciler::new("BTCUSDT", 1000);
//! reconciler.begin_resync();
//!
//! let bids = [PriceLevel::new(Decimal::from(100), Decimal::from(5))];
//! reconciler.install_snapshot(OrderBook::from_levels("BTCUSDT", 1000, &bids, &[]));
//!
//! let event = UpdateEvent::new(1001, 1002).with_bid(Decimal::from(100), Decimal::from(3));
//! assert_eq!(reconciler.on_event(event), EventOutcome::Applied);
//!
//! let view = reconciler.reader().view(5).unwrap();
//! assert_eq!(view.last_update_id, 1002);
//! ```

pub mod book;
pub mod reconciler;
pub mod registry;
pub mod side;
pub mod view;

pub use book::OrderBook;
pub use reconciler::{BookReader, EventOutcome, Reconciler, SnapshotOutcome, SyncState, SyncStats};
pub use registry::BookRegistry;
pub use side::{Levels, Side, SideKind};
pub use view::{render, BookView};
