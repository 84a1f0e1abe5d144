//! Read-side registry for several symbols' books.
//!
//! Each symbol runs its own [`Reconciler`](super::Reconciler) and sync task;
//! [`BookRegistry`] only collects their [`BookReader`] handles so a display or
//! downstream consumer can look books up by symbol.
//!
//! # Example
//!
//! ```rust
//! use binance_depthbook::orderbook::{BookRegistry, Reconciler};
//!
//! let btc = Reconciler::new("BTCUSDT", 1000);
//! let eth = Reconciler::new("ETHUSDT", 1000);
//!
//! let registry = BookRegistry::new();
//! registry.insert(btc.reader());
//! registry.insert(eth.reader());
//!
//! // Neither has a snapshot yet
//! assert_eq!(registry.symbols_not_ready().len(), 2);
//! assert!(registry.view("BTCUSDT", 5).is_err());
//! ```

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::Error;

use super::reconciler::{BookReader, SyncState};
use super::view::BookView;

/// Symbol-keyed collection of book readers
///
/// Safe to share across threads via `Arc<BookRegistry>`.
#[derive(Debug, Default)]
pub struct BookRegistry {
    readers: RwLock<FxHashMap<String, BookReader>>,
}

impl BookRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader under its symbol, replacing any previous one
    pub fn insert(&self, reader: BookReader) {
        let symbol = reader.symbol().to_string();
        self.readers.write().insert(symbol, reader);
    }

    /// Stop tracking a symbol
    pub fn remove(&self, symbol: &str) -> Option<BookReader> {
        self.readers.write().remove(symbol)
    }

    /// Get the reader for a symbol
    pub fn get(&self, symbol: &str) -> Option<BookReader> {
        self.readers.read().get(symbol).cloned()
    }

    /// Get the sync state of a symbol
    pub fn state(&self, symbol: &str) -> Option<SyncState> {
        self.readers.read().get(symbol).map(BookReader::state)
    }

    /// Copy out the top `n` levels of a symbol's book
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] if the symbol is unknown or its book is
    /// not live.
    pub fn view(&self, symbol: &str, n: usize) -> Result<BookView, Error> {
        match self.readers.read().get(symbol) {
            Some(reader) => reader.view(n),
            None => Err(Error::BookNotReady {
                symbol: symbol.to_string(),
            }),
        }
    }

    /// Get all symbols whose book is not live
    pub fn symbols_not_ready(&self) -> Vec<String> {
        self.readers
            .read()
            .iter()
            .filter(|(_, reader)| !reader.is_ready())
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    /// Get all tracked symbols
    pub fn symbols(&self) -> Vec<String> {
        self.readers.read().keys().cloned().collect()
    }

    /// Get number of tracked symbols
    pub fn len(&self) -> usize {
        self.readers.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.readers.read().is_empty()
    }
}
