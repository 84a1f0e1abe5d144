//! # binance-depthbook
//!
//! A local mirror of a [Binance](https://www.binance.com) spot order book,
//! built from a REST depth snapshot and kept current by the diff-depth
//! WebSocket stream.
//!
//! ## Features
//!
//! - **Gap-checked sync** - every update's id range is checked against the
//!   book's cursor; a skipped range triggers a fresh snapshot
//! - **Buffered bootstrap** - updates received while a snapshot is in flight
//!   are buffered and replayed on top of it
//! - **Concurrent reads** - cloneable [`BookReader`] handles copy out top-N
//!   views under a `parking_lot` read lock
//! - **Async/Await** - built on Tokio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binance_depthbook::{spawn_live, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), binance_depthbook::Error> {
//!     let config = Config::new("BTCUSDT");
//!     let live = spawn_live(config.clone()).await?;
//!
//!     loop {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!         match live.view(config.display_depth()) {
//!             Ok(view) => println!("{}", view),
//!             Err(e) => println!("{}", e),
//!         }
//!     }
//! }
//! ```
//!
//! ## Synchronization
//!
//! The [`Reconciler`] tracks the last applied update id (the cursor). With a
//! live book, an update `[first, last]` is discarded if `last <= cursor`,
//! applied if it covers `cursor + 1`, and treated as a gap if
//! `first > cursor + 1`. Until the first snapshot has been installed, and
//! during any resync, queries return [`Error::BookNotReady`].
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`orderbook`] - book, sides, reconciler, views
//! - [`client`] - REST snapshot loader and WebSocket stream reader
//! - [`sync`] - async driver combining the two
//! - [`types`] - numeric aliases and wire payloads
//! - [`config`] - symbol, depths, endpoints, retry policy
//! - [`error`] - error types for the crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod sync;
pub mod types;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use error::Error;
pub use orderbook::{render, BookReader, BookView, OrderBook, Reconciler};
pub use sync::{spawn_live, DepthSync, LiveBook};

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
