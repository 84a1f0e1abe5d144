//! WebSocket reader for the Binance diff-depth stream.
//!
//! [`DepthStream`] connects to `<symbol>@depth` and yields parsed
//! [`UpdateEvent`]s. [`DepthStream::forward`] pumps them into a channel so the
//! sync driver keeps receiving events while it waits on a snapshot.
//!
//! Reconnection is left to the caller: when the socket closes, the channel
//! closes, and the driver ends with [`Error::StreamClosed`].

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::Config;
use crate::error::Error;
use crate::types::messages::{DepthUpdateMsg, UpdateEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Diff-depth stream for one symbol
///
/// # Thread Safety
///
/// This reader is NOT thread-safe. Run it in its own task and hand events to
/// other tasks through [`DepthStream::forward`].
#[derive(Debug)]
pub struct DepthStream {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    symbol: String,
}

impl DepthStream {
    /// Connect to the diff-depth stream for the configured symbol
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        Self::connect_url(&config.stream_url(), config.symbol()).await
    }

    /// Connect to an explicit stream URL
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    pub async fn connect_url(url: &str, symbol: &str) -> Result<Self, Error> {
        tracing::debug!(url = %url, "Connecting to depth stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();

        tracing::info!(symbol = %symbol, "Depth stream connected");

        Ok(Self {
            write,
            read,
            symbol: symbol.to_string(),
        })
    }

    /// Get the symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Receive the next depth event
    ///
    /// Pings are answered automatically; pongs and binary frames are ignored.
    ///
    /// # Returns
    ///
    /// The next event, `Some(Err(Error::StreamClosed))` on a close frame, or
    /// `None` once the socket is gone.
    pub async fn next(&mut self) -> Option<Result<UpdateEvent, Error>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(parse_event(&text)),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.write.send(Message::Pong(data)).await {
                        return Some(Err(e.into()));
                    }
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(symbol = %self.symbol, frame = ?frame, "Depth stream closed by server");
                    return Some(Err(Error::StreamClosed));
                }
                Ok(_) => {
                    // Ignore other message types (Binary, Pong, Frame)
                    continue;
                }
                Err(e) => {
                    return Some(Err(e.into()));
                }
            }
        }
    }

    /// Pump events into `tx` until the socket or the receiver goes away
    ///
    /// A malformed message is logged and skipped; losing it shows up as a
    /// sequence gap downstream, which triggers a resync. Dropping `tx` on
    /// return closes the channel.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the stream. A close frame or a
    /// dropped receiver ends it with `Ok(())`.
    pub async fn forward(mut self, tx: mpsc::Sender<UpdateEvent>) -> Result<(), Error> {
        while let Some(result) = self.next().await {
            match result {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        tracing::debug!(symbol = %self.symbol, "Event receiver dropped");
                        let _ = self.close().await;
                        return Ok(());
                    }
                }
                Err(Error::StreamClosed) => return Ok(()),
                Err(e @ (Error::Json(_) | Error::MalformedUpdate(_))) => {
                    tracing::warn!(symbol = %self.symbol, error = %e, "Skipping malformed depth message");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Close the WebSocket connection
    pub async fn close(&mut self) -> Result<(), Error> {
        self.write.close().await?;
        Ok(())
    }
}

/// Parse one text frame into an [`UpdateEvent`]
///
/// # Errors
///
/// [`Error::Json`] if the frame is not a depth update,
/// [`Error::MalformedUpdate`] if a level does not parse.
pub fn parse_event(text: &str) -> Result<UpdateEvent, Error> {
    let msg: DepthUpdateMsg = serde_json::from_str(text)?;
    msg.into_event()
}
