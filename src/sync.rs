//! Async driver tying the snapshot loader, the event channel and the
//! reconciler together.
//!
//! [`DepthSync::run`] consumes an `mpsc` channel of [`UpdateEvent`]s. Whenever
//! the book is not live it fetches a snapshot, and while that request (or a
//! retry delay) is pending it keeps draining the channel into the
//! reconciler's buffer, so no event is lost during `Syncing`.
//!
//! [`spawn_live`] wires the production pieces: a [`DepthStream`] reader task
//! and a [`DepthSync`] task backed by [`RestClient`].

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{DepthStream, RestClient, SnapshotLoader};
use crate::config::{Config, RetryConfig};
use crate::error::Error;
use crate::orderbook::{BookReader, BookView, Reconciler, SnapshotOutcome};
use crate::types::messages::UpdateEvent;

/// Drives one symbol's reconciler
#[derive(Debug)]
pub struct DepthSync<L> {
    symbol: String,
    retry: RetryConfig,
    loader: L,
    reconciler: Reconciler,
}

impl<L: SnapshotLoader> DepthSync<L> {
    /// Create a driver for the configured symbol
    pub fn new(config: &Config, loader: L) -> Self {
        Self {
            symbol: config.symbol().to_string(),
            retry: config.retry().clone(),
            loader,
            reconciler: Reconciler::new(config.symbol(), config.buffer_capacity()),
        }
    }

    /// Get a read handle to the book
    pub fn reader(&self) -> BookReader {
        self.reconciler.reader()
    }

    /// Get the reconciler
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Process events until the channel closes
    ///
    /// # Errors
    ///
    /// - [`Error::StreamClosed`] when every sender has been dropped; this is
    ///   the normal end of a session.
    /// - The last snapshot error if it is not retryable or the retry policy
    ///   is exhausted.
    /// - [`Error::GapDetected`] if retries run out while every snapshot is
    ///   older than the buffered stream.
    pub async fn run(&mut self, mut events: mpsc::Receiver<UpdateEvent>) -> Result<(), Error> {
        tracing::info!(symbol = %self.symbol, "Depth sync started");

        loop {
            if !self.reconciler.is_live() {
                self.resync(&mut events).await?;
            }

            let Some(event) = events.recv().await else {
                tracing::info!(symbol = %self.symbol, "Update stream closed");
                return Err(Error::StreamClosed);
            };

            // A gap leaves the reconciler in Syncing; the next iteration resyncs
            self.reconciler.on_event(event);
        }
    }

    /// Fetch snapshots until one can be installed
    async fn resync(&mut self, events: &mut mpsc::Receiver<UpdateEvent>) -> Result<(), Error> {
        self.reconciler.begin_resync();
        let mut attempt = 0u32;

        loop {
            let fetch = self.loader.load_snapshot(&self.symbol);
            let fetched = buffer_while(fetch, events, &mut self.reconciler).await?;

            let (failure, min_delay) = match fetched {
                Ok(book) => match self.reconciler.install_snapshot(book) {
                    SnapshotOutcome::Synced { .. } => return Ok(()),
                    SnapshotOutcome::Rejected {
                        expected,
                        first_update_id,
                        ..
                    } => (
                        Error::GapDetected {
                            expected,
                            first_update_id,
                        },
                        None,
                    ),
                },
                Err(err) => {
                    if !err.is_retryable() {
                        tracing::warn!(symbol = %self.symbol, error = %err, "Snapshot failed, not retrying");
                        return Err(err);
                    }
                    let min_delay = err.retry_after();
                    (err, min_delay)
                }
            };

            if !self.retry.allows(attempt) {
                tracing::warn!(
                    symbol = %self.symbol,
                    attempts = attempt + 1,
                    error = %failure,
                    "Snapshot retries exhausted"
                );
                return Err(failure);
            }

            let delay = self
                .retry
                .jittered_delay(attempt)
                .max(min_delay.unwrap_or_default());

            tracing::warn!(
                symbol = %self.symbol,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Snapshot not usable, retrying"
            );

            buffer_while(tokio::time::sleep(delay), events, &mut self.reconciler).await?;
            attempt += 1;
        }
    }
}

/// Await `fut` while buffering every event that arrives in the meantime
async fn buffer_while<F: Future>(
    fut: F,
    events: &mut mpsc::Receiver<UpdateEvent>,
    reconciler: &mut Reconciler,
) -> Result<F::Output, Error> {
    tokio::pin!(fut);

    loop {
        tokio::select! {
            biased;

            output = &mut fut => return Ok(output),
            event = events.recv() => match event {
                Some(event) => {
                    reconciler.on_event(event);
                }
                None => return Err(Error::StreamClosed),
            },
        }
    }
}

/// A running mirror: stream reader task plus sync task
#[derive(Debug)]
pub struct LiveBook {
    reader: BookReader,
    sync_task: JoinHandle<Result<(), Error>>,
    stream_task: JoinHandle<Result<(), Error>>,
}

impl LiveBook {
    /// Get a read handle to the book
    pub fn reader(&self) -> &BookReader {
        &self.reader
    }

    /// Copy out the top `n` levels per side
    ///
    /// # Errors
    ///
    /// Returns [`Error::BookNotReady`] until the first sync completes and
    /// during any resync.
    pub fn view(&self, n: usize) -> Result<BookView, Error> {
        self.reader.view(n)
    }

    /// Whether either task has stopped
    pub fn is_finished(&self) -> bool {
        self.sync_task.is_finished() || self.stream_task.is_finished()
    }

    /// Stop both tasks
    pub fn abort(&self) {
        self.stream_task.abort();
        self.sync_task.abort();
    }

    /// Wait for the sync task to end and return its result
    ///
    /// When the sync task stopped because the stream ended, the stream task's
    /// own error (a transport failure, for instance) is returned instead of
    /// [`Error::StreamClosed`]. Otherwise the stream task is aborted.
    pub async fn join(self) -> Result<(), Error> {
        let result = match self.sync_task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                self.stream_task.abort();
                return Err(Error::StreamClosed);
            }
            Err(e) => Err(Error::TaskFailed(format!("sync task panicked: {}", e))),
        };

        match result {
            // The channel only closes once the stream task has returned
            Err(Error::StreamClosed) => match self.stream_task.await {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) => Err(Error::StreamClosed),
                Err(e) if e.is_cancelled() => Err(Error::StreamClosed),
                Err(e) => Err(Error::TaskFailed(format!("stream task panicked: {}", e))),
            },
            other => {
                self.stream_task.abort();
                other
            }
        }
    }
}

/// Connect the stream, then start syncing against the REST snapshot
///
/// The WebSocket is connected before the first snapshot is requested so
/// every update after the snapshot is already on its way into the buffer.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the stream cannot be
/// connected. Snapshot failures are handled inside the sync task.
pub async fn spawn_live(config: Config) -> Result<LiveBook, Error> {
    config.validate()?;

    let rest = RestClient::new(&config)?;
    let stream = DepthStream::connect(&config).await?;
    let (tx, rx) = mpsc::channel(config.buffer_capacity());

    let mut sync = DepthSync::new(&config, rest);
    let reader = sync.reader();

    let stream_task = tokio::spawn(stream.forward(tx));
    let sync_task = tokio::spawn(async move { sync.run(rx).await });

    Ok(LiveBook {
        reader,
        sync_task,
        stream_task,
    })
}
