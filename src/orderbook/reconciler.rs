//! Snapshot / diff-stream reconciliation.
//!
//! [`Reconciler`] owns the book for one symbol and decides, per update event,
//! whether to apply it, drop it as stale, buffer it, or abandon the book
//! because the stream skipped ahead of the cursor.
//!
//! # States
//!
//! - `Unsynced`: nothing applied yet; events are buffered.
//! - `Syncing`: a snapshot is being fetched; events are still buffered.
//! - `Live`: the book is consistent; events are checked against the cursor.
//!
//! # Continuity
//!
//! With `cursor` the last applied update id, an event `[first, last]` is
//!
//! - stale if `last <= cursor` (discarded),
//! - contiguous if `first <= cursor + 1 <= last` (applied, `cursor = last`),
//! - a gap if `first > cursor + 1` (book dropped, back to `Syncing`).
//!
//! The reconciler does no I/O. The sync driver fetches snapshots and feeds
//! them to [`Reconciler::install_snapshot`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;
use crate::types::messages::UpdateEvent;
use crate::types::{Price, Quantity, UpdateId};

use super::view::BookView;
use super::OrderBook;

/// Synchronization state of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No snapshot requested yet
    Unsynced,
    /// Waiting for a snapshot
    Syncing,
    /// Book is consistent and applying updates
    Live,
}

/// What happened to an event passed to [`Reconciler::on_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Applied to the book; the cursor moved to the event's last id
    Applied,
    /// Entirely behind the cursor, dropped
    Discarded,
    /// Held until the next snapshot lands
    Buffered,
    /// The event starts beyond `cursor + 1`; the book was dropped and the
    /// event buffered
    GapDetected {
        /// The id the book needed next
        expected: UpdateId,
        /// First id of the offending event
        first_update_id: UpdateId,
    },
}

/// Result of [`Reconciler::install_snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot accepted; the book is live
    Synced {
        /// Snapshot's own update id
        snapshot_id: UpdateId,
        /// Cursor after replaying buffered events
        last_update_id: UpdateId,
        /// Buffered events applied on top of the snapshot
        applied: usize,
        /// Buffered events older than the snapshot
        discarded: usize,
    },
    /// Buffered events start beyond the snapshot's cursor; a newer snapshot is
    /// needed
    Rejected {
        /// Snapshot's own update id
        snapshot_id: UpdateId,
        /// The id the book needed next
        expected: UpdateId,
        /// First id of the earliest unbridgeable event
        first_update_id: UpdateId,
    },
}

/// Counters kept by the reconciler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Events applied to a book (live or during replay)
    pub applied: u64,
    /// Events discarded as stale
    pub discarded: u64,
    /// Buffered events dropped because the buffer was full
    pub overflowed: u64,
    /// Gaps detected on the live stream
    pub gaps: u64,
    /// Times a live book was abandoned for a fresh snapshot
    pub resyncs: u64,
    /// Snapshots accepted
    pub snapshots: u64,
    /// Snapshots rejected as older than the buffered stream
    pub rejected_snapshots: u64,
}

#[derive(Debug)]
enum Phase {
    Unsynced,
    Syncing,
    Live(OrderBook),
}

impl Phase {
    fn state(&self) -> SyncState {
        match self {
            Phase::Unsynced => SyncState::Unsynced,
            Phase::Syncing => SyncState::Syncing,
            Phase::Live(_) => SyncState::Live,
        }
    }
}

#[derive(Debug)]
struct Shared {
    phase: Phase,
    stats: SyncStats,
}

/// Single writer for one symbol's book
#[derive(Debug)]
pub struct Reconciler {
    symbol: String,
    capacity: usize,
    buffer: VecDeque<UpdateEvent>,
    shared: Arc<RwLock<Shared>>,
}

impl Reconciler {
    /// Create a reconciler in the `Unsynced` state
    ///
    /// `capacity` bounds the number of events held while no book is live;
    /// the oldest event is dropped on overflow. A capacity of 0 is treated
    /// as 1.
    #[must_use]
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            capacity,
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            shared: Arc::new(RwLock::new(Shared {
                phase: Phase::Unsynced,
                stats: SyncStats::default(),
            })),
        }
    }

    /// Get the symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get a read handle to the book
    #[must_use]
    pub fn reader(&self) -> BookReader {
        BookReader {
            symbol: self.symbol.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Get the current state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.shared.read().phase.state()
    }

    /// Whether the book is live
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state() == SyncState::Live
    }

    /// Cursor of the live book, if any
    #[must_use]
    pub fn cursor(&self) -> Option<UpdateId> {
        match &self.shared.read().phase {
            Phase::Live(book) => Some(book.last_update_id()),
            _ => None,
        }
    }

    /// Number of buffered events
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Get the counters
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.read().stats
    }

    /// Enter `Syncing`, dropping any live book
    ///
    /// Buffered events are kept; they are exactly what the next snapshot
    /// will be reconciled against.
    pub fn begin_resync(&mut self) {
        let mut shared = self.shared.write();
        if let Phase::Live(_) = shared.phase {
            shared.stats.resyncs += 1;
        }
        shared.phase = Phase::Syncing;
        tracing::debug!(
            symbol = %self.symbol,
            buffered = self.buffer.len(),
            "Resynchronization started"
        );
    }

    /// Process one event from the stream
    pub fn on_event(&mut self, event: UpdateEvent) -> EventOutcome {
        let mut shared = self.shared.write();
        let Shared { phase, stats } = &mut *shared;

        let Phase::Live(book) = &mut *phase else {
            drop(shared);
            self.push_buffered(event);
            return EventOutcome::Buffered;
        };

        let cursor = book.last_update_id();

        if event.last_update_id <= cursor {
            stats.discarded += 1;
            tracing::trace!(
                symbol = %self.symbol,
                cursor,
                last_update_id = event.last_update_id,
                "Stale update discarded"
            );
            return EventOutcome::Discarded;
        }

        let expected = cursor.saturating_add(1);

        if event.first_update_id <= expected {
            book.apply_event(&event);
            stats.applied += 1;
            tracing::trace!(
                symbol = %self.symbol,
                first_update_id = event.first_update_id,
                last_update_id = event.last_update_id,
                "Update applied"
            );
            return EventOutcome::Applied;
        }

        let first_update_id = event.first_update_id;
        *phase = Phase::Syncing;
        stats.gaps += 1;
        stats.resyncs += 1;
        drop(shared);

        tracing::warn!(
            symbol = %self.symbol,
            expected,
            got_first = first_update_id,
            got_last = event.last_update_id,
            "Depth sequence gap detected, re-syncing"
        );

        self.buffer.clear();
        self.push_buffered(event);

        EventOutcome::GapDetected {
            expected,
            first_update_id,
        }
    }

    /// Reconcile a freshly loaded snapshot with the buffered events
    ///
    /// Buffered events ending at or before the snapshot's cursor are dropped.
    /// The rest are applied in ascending `first_update_id` order while each
    /// one covers `cursor + 1`. If one starts beyond `cursor + 1` the snapshot
    /// is rejected: every event that was not stale goes back into the buffer
    /// and the state stays `Syncing`.
    pub fn install_snapshot(&mut self, snapshot: OrderBook) -> SnapshotOutcome {
        let mut book = snapshot;
        let snapshot_id = book.last_update_id();

        let mut pending: Vec<UpdateEvent> = self.buffer.drain(..).collect();
        pending.sort_by_key(|e| e.first_update_id);

        let mut replayed = 0;
        let mut discarded = 0;
        let mut gap = None;

        for event in &pending {
            let cursor = book.last_update_id();
            if event.last_update_id <= cursor {
                discarded += 1;
            } else if event.first_update_id <= cursor.saturating_add(1) {
                book.apply_event(event);
                replayed += 1;
            } else {
                gap = Some((cursor.saturating_add(1), event.first_update_id));
                break;
            }
        }

        let mut shared = self.shared.write();

        if let Some((expected, first_update_id)) = gap {
            shared.phase = Phase::Syncing;
            shared.stats.rejected_snapshots += 1;
            drop(shared);

            // Keep everything the next snapshot may still need
            self.buffer
                .extend(pending.into_iter().filter(|e| e.last_update_id > snapshot_id));

            tracing::warn!(
                symbol = %self.symbol,
                snapshot_id,
                expected,
                event_first = first_update_id,
                "Snapshot older than buffered stream, need a newer one"
            );

            return SnapshotOutcome::Rejected {
                snapshot_id,
                expected,
                first_update_id,
            };
        }

        let last_update_id = book.last_update_id();
        shared.phase = Phase::Live(book);
        shared.stats.snapshots += 1;
        shared.stats.applied += replayed as u64;
        shared.stats.discarded += discarded as u64;
        drop(shared);

        tracing::info!(
            symbol = %self.symbol,
            snapshot_id,
            last_update_id,
            applied = replayed,
            dropped = discarded,
            "Depth stream synchronized"
        );

        SnapshotOutcome::Synced {
            snapshot_id,
            last_update_id,
            applied: replayed,
            discarded,
        }
    }

    fn push_buffered(&mut self, event: UpdateEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            self.shared.write().stats.overflowed += 1;
        }
        self.buffer.push_back(event);
    }
}

/// Cloneable read handle to a reconciler's book
///
/// Every accessor takes the read lock once, so it never observes a
/// half-applied event.
#[derive(Debug, Clone)]
pub struct BookReader {
    symbol: String,
    shared: Arc<RwLock<Shared>>,
}

impl BookReader {
    /// Get the symbol
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the current synchronization state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.shared.read().phase.state()
    }

    /// Whether the book can be queried
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == SyncState::Live
    }

    /// Get the counters
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.read().stats
    }

    /// Run `f` against the live book
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] unless the book is live.
    pub fn with_book<R>(&self, f: impl FnOnce(&OrderBook) -> R) -> Result<R, Error> {
        match &self.shared.read().phase {
            Phase::Live(book) => Ok(f(book)),
            _ => Err(Error::BookNotReady {
                symbol: self.symbol.clone(),
            }),
        }
    }

    /// Copy out the top `n` levels per side
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] unless the book is live.
    pub fn view(&self, n: usize) -> Result<BookView, Error> {
        self.with_book(|book| book.snapshot_view(n))
    }

    /// Get the best bid
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] unless the book is live.
    pub fn best_bid(&self) -> Result<Option<(Price, Quantity)>, Error> {
        self.with_book(OrderBook::best_bid)
    }

    /// Get the best ask
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] unless the book is live.
    pub fn best_ask(&self) -> Result<Option<(Price, Quantity)>, Error> {
        self.with_book(OrderBook::best_ask)
    }

    /// Get the cursor of the live book
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] unless the book is live.
    pub fn last_update_id(&self) -> Result<UpdateId, Error> {
        self.with_book(OrderBook::last_update_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceLevel;
    use rust_decimal_macros::dec;

    fn snapshot(last_update_id: UpdateId) -> OrderBook {
        OrderBook::from_levels(
            "BTCUSDT",
            last_update_id,
            &[PriceLevel::new(dec!(100.0), dec!(5))],
            &[PriceLevel::new(dec!(101.0), dec!(2))],
        )
    }

    fn live(last_update_id: UpdateId) -> Reconciler {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        reconciler.begin_resync();
        let outcome = reconciler.install_snapshot(snapshot(last_update_id));
        assert!(matches!(outcome, SnapshotOutcome::Synced { .. }));
        reconciler
    }

    #[test]
    fn test_initial_state_not_ready() {
        let reconciler = Reconciler::new("BTCUSDT", 16);
        assert_eq!(reconciler.state(), SyncState::Unsynced);

        let reader = reconciler.reader();
        assert!(!reader.is_ready());
        assert!(matches!(reader.view(5), Err(Error::BookNotReady { .. })));
    }

    #[test]
    fn test_buffers_before_snapshot() {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        assert_eq!(
            reconciler.on_event(UpdateEvent::new(1, 2)),
            EventOutcome::Buffered
        );

        reconciler.begin_resync();
        assert_eq!(reconciler.state(), SyncState::Syncing);
        assert_eq!(
            reconciler.on_event(UpdateEvent::new(3, 4)),
            EventOutcome::Buffered
        );
        assert_eq!(reconciler.buffered(), 2);
    }

    #[test]
    fn test_buffer_drops_oldest_on_overflow() {
        let mut reconciler = Reconciler::new("BTCUSDT", 3);
        for i in 0..5 {
            reconciler.on_event(UpdateEvent::new(100 + i * 2, 101 + i * 2));
        }

        assert_eq!(reconciler.buffered(), 3);
        assert_eq!(reconciler.stats().overflowed, 2);

        // Oldest two (100-101, 102-103) are gone; snapshot at 103 bridges to 104
        let outcome = reconciler.install_snapshot(snapshot(103));
        assert_eq!(
            outcome,
            SnapshotOutcome::Synced {
                snapshot_id: 103,
                last_update_id: 109,
                applied: 3,
                discarded: 0,
            }
        );
    }

    #[test]
    fn test_stale_event_is_noop() {
        let mut reconciler = live(1000);
        let reader = reconciler.reader();
        let before = reader.view(10).unwrap();

        let stale = UpdateEvent::new(999, 1000).with_bid(dec!(100.0), dec!(0));
        assert_eq!(reconciler.on_event(stale), EventOutcome::Discarded);

        assert_eq!(reader.view(10).unwrap(), before);
        assert_eq!(reconciler.cursor(), Some(1000));
    }

    #[test]
    fn test_contiguous_event_advances_cursor_exactly() {
        let mut reconciler = live(1000);

        let event = UpdateEvent::new(1001, 1002).with_bid(dec!(100.0), dec!(3));
        assert_eq!(reconciler.on_event(event), EventOutcome::Applied);
        assert_eq!(reconciler.cursor(), Some(1002));

        // Overlapping the cursor still qualifies as long as it covers cursor + 1
        let overlap = UpdateEvent::new(995, 1010);
        assert_eq!(reconciler.on_event(overlap), EventOutcome::Applied);
        assert_eq!(reconciler.cursor(), Some(1010));
    }

    #[test]
    fn test_gap_forces_syncing() {
        let mut reconciler = live(1000);
        let reader = reconciler.reader();

        let outcome = reconciler.on_event(UpdateEvent::new(1005, 1006));
        assert_eq!(
            outcome,
            EventOutcome::GapDetected {
                expected: 1001,
                first_update_id: 1005,
            }
        );
        assert_eq!(reconciler.state(), SyncState::Syncing);
        assert_eq!(reconciler.buffered(), 1);
        assert!(!reader.is_ready());

        let stats = reconciler.stats();
        assert_eq!(stats.gaps, 1);
        assert_eq!(stats.resyncs, 1);
    }

    #[test]
    fn test_replay_in_ascending_order() {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        reconciler.begin_resync();

        // Arrive out of order
        reconciler.on_event(UpdateEvent::new(1003, 1004).with_bid(dec!(100.0), dec!(9)));
        reconciler.on_event(UpdateEvent::new(995, 999));
        reconciler.on_event(UpdateEvent::new(1001, 1002).with_bid(dec!(100.0), dec!(3)));

        let outcome = reconciler.install_snapshot(snapshot(1000));
        assert_eq!(
            outcome,
            SnapshotOutcome::Synced {
                snapshot_id: 1000,
                last_update_id: 1004,
                applied: 2,
                discarded: 1,
            }
        );

        let reader = reconciler.reader();
        assert_eq!(reader.best_bid().unwrap(), Some((dec!(100.0), dec!(9))));
        assert_eq!(reconciler.buffered(), 0);
    }

    #[test]
    fn test_snapshot_older_than_buffer_rejected() {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        reconciler.begin_resync();
        reconciler.on_event(UpdateEvent::new(1001, 1002));
        reconciler.on_event(UpdateEvent::new(1003, 1004));

        let outcome = reconciler.install_snapshot(snapshot(990));
        assert_eq!(
            outcome,
            SnapshotOutcome::Rejected {
                snapshot_id: 990,
                expected: 991,
                first_update_id: 1001,
            }
        );
        assert_eq!(reconciler.state(), SyncState::Syncing);
        assert_eq!(reconciler.buffered(), 2);

        // A newer snapshot bridges the buffered events
        let outcome = reconciler.install_snapshot(snapshot(1000));
        assert!(matches!(
            outcome,
            SnapshotOutcome::Synced {
                last_update_id: 1004,
                ..
            }
        ));
    }

    #[test]
    fn test_rejected_snapshot_keeps_replayed_events() {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        reconciler.begin_resync();
        reconciler.on_event(UpdateEvent::new(1001, 1002).with_ask(dec!(101.0), dec!(7)));
        reconciler.on_event(UpdateEvent::new(1010, 1011));

        // 1001-1002 replays, then 1010 cannot be bridged
        assert!(matches!(
            reconciler.install_snapshot(snapshot(1000)),
            SnapshotOutcome::Rejected { expected: 1003, .. }
        ));
        assert_eq!(reconciler.buffered(), 2);
    }

    #[test]
    fn test_snapshot_newer_than_buffer() {
        let mut reconciler = Reconciler::new("BTCUSDT", 16);
        reconciler.begin_resync();
        reconciler.on_event(UpdateEvent::new(10, 20));

        let outcome = reconciler.install_snapshot(snapshot(500));
        assert_eq!(
            outcome,
            SnapshotOutcome::Synced {
                snapshot_id: 500,
                last_update_id: 500,
                applied: 0,
                discarded: 1,
            }
        );
        assert!(reconciler.is_live());
    }

    #[test]
    fn test_zero_quantity_for_absent_price() {
        let mut reconciler = live(1000);
        let reader = reconciler.reader();
        let before = reader.view(10).unwrap();

        let event = UpdateEvent::new(1001, 1001).with_bid(dec!(42.0), dec!(0));
        assert_eq!(reconciler.on_event(event), EventOutcome::Applied);

        let after = reader.view(10).unwrap();
        assert_eq!(after.bids, before.bids);
        assert_eq!(after.asks, before.asks);
        assert_eq!(after.last_update_id, 1001);
    }

    #[test]
    fn test_gap_resync_replays_buffered_events() {
        let mut reconciler = live(1000);
        let reader = reconciler.reader();

        reconciler.on_event(UpdateEvent::new(1001, 1002).with_bid(dec!(100.0), dec!(3)));
        assert!(matches!(
            reconciler.on_event(UpdateEvent::new(1005, 1006).with_bid(dec!(99.0), dec!(7))),
            EventOutcome::GapDetected { expected: 1003, .. }
        ));
        reconciler.on_event(UpdateEvent::new(1007, 1008).with_bid(dec!(98.0), dec!(1)));

        reconciler.begin_resync();
        let resynced = OrderBook::from_levels(
            "BTCUSDT",
            1004,
            &[PriceLevel::new(dec!(100.0), dec!(3))],
            &[PriceLevel::new(dec!(101.0), dec!(2))],
        );
        assert_eq!(
            reconciler.install_snapshot(resynced),
            SnapshotOutcome::Synced {
                snapshot_id: 1004,
                last_update_id: 1008,
                applied: 2,
                discarded: 0,
            }
        );

        let view = reader.view(10).unwrap();
        assert_eq!(
            view.bids,
            vec![
                PriceLevel::new(dec!(100.0), dec!(3)),
                PriceLevel::new(dec!(99.0), dec!(7)),
                PriceLevel::new(dec!(98.0), dec!(1)),
            ]
        );
        assert_eq!(reconciler.stats().resyncs, 1);
    }

    #[test]
    fn test_cursor_at_max_does_not_overflow() {
        let mut reconciler = live(u64::MAX);

        assert_eq!(
            reconciler.on_event(UpdateEvent::new(u64::MAX, u64::MAX)),
            EventOutcome::Discarded
        );
        assert_eq!(reconciler.cursor(), Some(u64::MAX));

        let mut syncing = Reconciler::new("BTCUSDT", 4);
        syncing.on_event(UpdateEvent::new(5, u64::MAX));
        assert!(matches!(
            syncing.install_snapshot(snapshot(u64::MAX)),
            SnapshotOutcome::Synced { last_update_id: u64::MAX, .. }
        ));
    }
}
