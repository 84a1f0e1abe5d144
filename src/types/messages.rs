//! Binance depth payloads.
//!
//! This module contains the REST depth snapshot body and the diff-depth
//! WebSocket event, plus [`UpdateEvent`], the parsed form the reconciler
//! consumes.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::{PriceLevel, TimestampMs, UpdateId};
use crate::error::Error;

/// A raw `["price", "quantity"]` pair as sent by Binance
pub type RawLevel = [String; 2];

/// Response body of `GET /api/v3/depth`
///
/// ```json
/// {
///   "lastUpdateId": 1027024,
///   "bids": [["4.00000000", "431.00000000"]],
///   "asks": [["4.00000200", "12.00000000"]]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    /// Last update id included in this snapshot
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: UpdateId,
    /// Bid levels, best first
    pub bids: Vec<RawLevel>,
    /// Ask levels, best first
    pub asks: Vec<RawLevel>,
}

impl DepthSnapshot {
    /// Parse both sides into decimal levels
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotParse`] if any price or quantity is not a
    /// valid decimal.
    pub fn parse_levels(&self) -> Result<(Vec<PriceLevel>, Vec<PriceLevel>), Error> {
        let bids = parse_levels(&self.bids)
            .map_err(|e| Error::SnapshotParse(format!("bid level: {}", e)))?;
        let asks = parse_levels(&self.asks)
            .map_err(|e| Error::SnapshotParse(format!("ask level: {}", e)))?;
        Ok((bids, asks))
    }

    /// Whether the snapshot carries no levels at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Diff-depth event from `<symbol>@depth`
///
/// ```json
/// {
///   "e": "depthUpdate",
///   "E": 1672515782136,
///   "s": "BNBBTC",
///   "U": 157,
///   "u": 160,
///   "b": [["0.0024", "10"]],
///   "a": [["0.0026", "100"]]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdateMsg {
    /// Event type (always `depthUpdate`)
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time
    #[serde(rename = "E")]
    pub event_time: TimestampMs,
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// First update id in event
    #[serde(rename = "U")]
    pub first_update_id: UpdateId,
    /// Final update id in event
    #[serde(rename = "u")]
    pub last_update_id: UpdateId,
    /// Bid changes
    #[serde(rename = "b")]
    pub bids: Vec<RawLevel>,
    /// Ask changes
    #[serde(rename = "a")]
    pub asks: Vec<RawLevel>,
}

impl DepthUpdateMsg {
    /// Convert into the parsed [`UpdateEvent`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedUpdate`] if a level does not parse.
    pub fn into_event(self) -> Result<UpdateEvent, Error> {
        let bid_changes = parse_levels(&self.bids).map_err(|e| {
            Error::MalformedUpdate(format!("update {}: bid level: {}", self.last_update_id, e))
        })?;
        let ask_changes = parse_levels(&self.asks).map_err(|e| {
            Error::MalformedUpdate(format!("update {}: ask level: {}", self.last_update_id, e))
        })?;

        Ok(UpdateEvent {
            first_update_id: self.first_update_id,
            last_update_id: self.last_update_id,
            event_time: Some(self.event_time),
            bid_changes,
            ask_changes,
        })
    }
}

/// One incremental update, covering the inclusive id range
/// `[first_update_id, last_update_id]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    /// First update id collapsed into this event
    pub first_update_id: UpdateId,
    /// Last update id collapsed into this event
    pub last_update_id: UpdateId,
    /// Exchange event time, if known
    pub event_time: Option<TimestampMs>,
    /// Bid level changes
    pub bid_changes: Vec<PriceLevel>,
    /// Ask level changes
    pub ask_changes: Vec<PriceLevel>,
}

impl UpdateEvent {
    /// Create an event without level changes
    #[must_use]
    pub fn new(first_update_id: UpdateId, last_update_id: UpdateId) -> Self {
        Self {
            first_update_id,
            last_update_id,
            event_time: None,
            bid_changes: Vec::new(),
            ask_changes: Vec::new(),
        }
    }

    /// Add a bid change
    #[must_use]
    pub fn with_bid(mut self, price: Decimal, quantity: Decimal) -> Self {
        self.bid_changes.push(PriceLevel::new(price, quantity));
        self
    }

    /// Add an ask change
    #[must_use]
    pub fn with_ask(mut self, price: Decimal, quantity: Decimal) -> Self {
        self.ask_changes.push(PriceLevel::new(price, quantity));
        self
    }

    /// Whether `id` falls inside this event's range
    #[must_use]
    pub const fn covers(&self, id: UpdateId) -> bool {
        self.first_update_id <= id && id <= self.last_update_id
    }
}

/// Parse raw string pairs into decimal levels
pub fn parse_levels(raw: &[RawLevel]) -> Result<Vec<PriceLevel>, rust_decimal::Error> {
    raw.iter()
        .map(|[price, quantity]| -> Result<PriceLevel, rust_decimal::Error> {
            Ok(PriceLevel::new(
                Decimal::from_str(price)?,
                Decimal::from_str(quantity)?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_snapshot() {
        let json = r#"{
            "lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"]],
            "asks": [["4.00000200", "12.00000000"], ["4.00000300", "1.5"]]
        }"#;

        let snapshot: DepthSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.last_update_id, 1027024);

        let (bids, asks) = snapshot.parse_levels().unwrap();
        assert_eq!(bids, vec![PriceLevel::new(dec!(4), dec!(431))]);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[1].quantity, dec!(1.5));
    }

    #[test]
    fn test_snapshot_bad_decimal() {
        let json = r#"{"lastUpdateId": 1, "bids": [["abc", "1"]], "asks": []}"#;
        let snapshot: DepthSnapshot = serde_json::from_str(json).unwrap();

        let err = snapshot.parse_levels().unwrap_err();
        assert!(matches!(err, Error::SnapshotParse(_)));
    }

    #[test]
    fn test_deserialize_depth_update() {
        let json = r#"{
            "e": "depthUpdate",
            "E": 1672515782136,
            "s": "BNBBTC",
            "U": 157,
            "u": 160,
            "b": [["0.0024", "10"]],
            "a": [["0.0026", "100"], ["0.0027", "0.00000000"]]
        }"#;

        let msg: DepthUpdateMsg = serde_json::from_str(json).unwrap();
        assert_eq!(msg.symbol, "BNBBTC");

        let event = msg.into_event().unwrap();
        assert_eq!(event.first_update_id, 157);
        assert_eq!(event.last_update_id, 160);
        assert_eq!(event.event_time, Some(1672515782136));
        assert_eq!(event.bid_changes, vec![PriceLevel::new(dec!(0.0024), dec!(10))]);
        assert!(event.ask_changes[1].is_tombstone());
    }

    #[test]
    fn test_covers() {
        let event = UpdateEvent::new(1001, 1002);
        assert!(!event.covers(1000));
        assert!(event.covers(1001));
        assert!(event.covers(1002));
        assert!(!event.covers(1003));
    }
}
