//! Exchange clients.
//!
//! This module contains:
//!
//! - [`rest`] - HTTP client for the depth snapshot
//! - [`websocket`] - diff-depth stream reader
//! - [`SnapshotLoader`] - the seam between the sync driver and the snapshot source

pub mod rest;
pub mod websocket;

use std::future::Future;

use crate::error::Error;
use crate::orderbook::OrderBook;

pub use rest::RestClient;
pub use websocket::DepthStream;

/// Source of full-depth snapshots
///
/// Implemented by [`RestClient`]; tests substitute scripted loaders.
pub trait SnapshotLoader: Send + Sync {
    /// Fetch a snapshot for `symbol`
    ///
    /// The returned book's [`OrderBook::last_update_id`] is the id the
    /// exchange reports as the last update included in the snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::SnapshotFetch`], [`Error::SnapshotParse`] or
    /// [`Error::SnapshotEmpty`]. The loader never retries on its own.
    fn load_snapshot(&self, symbol: &str) -> impl Future<Output = Result<OrderBook, Error>> + Send;
}
