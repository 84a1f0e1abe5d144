//! Error types for the binance-depthbook crate.
//!
//! Snapshot errors come from the loader and are surfaced to the sync driver,
//! which retries them by policy. `GapDetected` mostly shows up in logs and
//! reconciler outcomes; the driver returns it only when it runs out of
//! retries on snapshots older than the stream. `StreamClosed` ends a session.

use thiserror::Error;

use crate::types::UpdateId;

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Snapshot request failed at the transport level or returned a
    /// non-success status
    #[error("snapshot fetch failed: {0}")]
    SnapshotFetch(#[from] FetchError),

    /// Snapshot body could not be parsed
    #[error("snapshot parse error: {0}")]
    SnapshotParse(String),

    /// Snapshot contained no levels on either side
    #[error("snapshot for {symbol} contains no levels")]
    SnapshotEmpty {
        /// Symbol the snapshot was requested for
        symbol: String,
    },

    /// Update stream skipped ahead of the cursor
    #[error("update gap: expected id {expected}, event starts at {first_update_id}")]
    GapDetected {
        /// The id the book needed next (`cursor + 1`)
        expected: UpdateId,
        /// First id of the offending event
        first_update_id: UpdateId,
    },

    /// Update stream ended
    #[error("update stream closed")]
    StreamClosed,

    /// The book has not completed a synchronization yet
    #[error("book for {symbol} is not ready")]
    BookNotReady {
        /// Symbol being queried
        symbol: String,
    },

    /// A depth update could not be parsed
    #[error("malformed depth update: {0}")]
    MalformedUpdate(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON decoding error on the stream
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A background task panicked
    #[error("task failed: {0}")]
    TaskFailed(String),
}

/// Why a snapshot request failed
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure, or timeout
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Exchange returned an error status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Body or error message from the exchange
        message: String,
    },

    /// Rate limited (HTTP 429) or IP banned (HTTP 418)
    #[error("rate limited (HTTP {status})")]
    RateLimited {
        /// HTTP status code
        status: u16,
        /// Retry after this many seconds, if the exchange said so
        retry_after_secs: Option<u64>,
    },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::SnapshotFetch(FetchError::Transport(err))
    }
}

impl Error {
    /// Whether a fresh snapshot request may succeed where this one failed
    ///
    /// Fetch errors are transient by nature. Parse and empty errors are also
    /// worth another request since the exchange may have served a truncated or
    /// transient response. Stream and configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::SnapshotFetch(FetchError::Status { status, .. }) => {
                // 4xx other than rate limiting means the request itself is wrong
                !(400..500).contains(status)
            }
            Error::SnapshotFetch(_) | Error::SnapshotParse(_) | Error::SnapshotEmpty { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Suggested minimum wait before retrying, if the exchange sent one
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Error::SnapshotFetch(FetchError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            }) => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }
}
