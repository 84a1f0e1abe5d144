//! HTTP REST client for the Binance depth snapshot.
//!
//! This module provides the [`RestClient`], the production
//! [`SnapshotLoader`]. Market data endpoints are public, so requests are not
//! signed.
//!
//! # Example
//!
//! ```rust,no_run
//! use binance_depthbook::client::{RestClient, SnapshotLoader};
//! use binance_depthbook::Config;
//!
//! # async fn example() -> binance_depthbook::Result<()> {
//! let config = Config::new("BTCUSDT");
//! let rest = RestClient::new(&config)?;
//!
//! let book = rest.load_snapshot("BTCUSDT").await?;
//! println!("snapshot at {}: {:?}", book.last_update_id(), book.best_bid());
//! # Ok(())
//! # }
//! ```

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::SnapshotLoader;
use crate::config::Config;
use crate::error::{Error, FetchError};
use crate::orderbook::OrderBook;
use crate::types::messages::DepthSnapshot;

/// HTTP client for the Binance REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    depth_limit: u32,
}

impl RestClient {
    /// Create a new REST client
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration (environment, timeout, depth limit)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_base_url(config, config.rest_base_url())
    }

    /// Create a REST client against a custom base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(config: &Config, base_url: impl Into<String>) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            depth_limit: config.depth_limit(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the snapshot depth limit
    pub fn depth_limit(&self) -> u32 {
        self.depth_limit
    }

    /// Build the full URL for an endpoint with query parameters
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), query)
            .map_err(|e| Error::Config(format!("invalid URL for {}: {}", path, e)))
    }

    /// Make a GET request to the API
    ///
    /// # Arguments
    ///
    /// * `path` - API path (without base URL)
    /// * `query` - Query string parameters
    ///
    /// # Returns
    ///
    /// Deserialized response body
    pub async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path, query)?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the raw order book depth snapshot
    ///
    /// `GET /api/v3/depth?symbol=SYMBOL&limit=LIMIT`
    pub async fn get_depth_snapshot(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<DepthSnapshot, Error> {
        let limit = limit.to_string();

        tracing::debug!(symbol = %symbol, limit = %limit, "Fetching depth snapshot");

        let snapshot: DepthSnapshot = self
            .get("/api/v3/depth", &[("symbol", symbol), ("limit", &limit)])
            .await?;

        tracing::debug!(
            symbol = %symbol,
            last_update_id = snapshot.last_update_id,
            bid_levels = snapshot.bids.len(),
            ask_levels = snapshot.asks.len(),
            "Depth snapshot received"
        );

        Ok(snapshot)
    }

    /// Handle the HTTP response, checking for errors
    async fn handle_response<T>(&self, response: reqwest::Response) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let status = response.status();

        if let Some(err) = rate_limit_error(status, response.headers()) {
            return Err(err.into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body).into());
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::SnapshotParse(e.to_string()))
    }
}

/// Map 429 (request weight exceeded) and 418 (IP auto-banned after repeated
/// 429s) to [`FetchError::RateLimited`], reading `Retry-After` in seconds
fn rate_limit_error(status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::IM_A_TEAPOT {
        return None;
    }

    let retry_after_secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());

    Some(FetchError::RateLimited {
        status: status.as_u16(),
        retry_after_secs,
    })
}

/// Map a non-success response to [`FetchError::Status`]
///
/// Binance errors look like `{"code": -1121, "msg": "Invalid symbol."}`; any
/// other body is kept as is.
fn status_error(status: StatusCode, body: &str) -> FetchError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("msg").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    FetchError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Build a book from a parsed snapshot body
///
/// # Errors
///
/// [`Error::SnapshotParse`] for bad decimals, [`Error::SnapshotEmpty`] if no
/// level with a positive quantity remains on either side.
pub fn book_from_snapshot(symbol: &str, snapshot: &DepthSnapshot) -> Result<OrderBook, Error> {
    if snapshot.is_empty() {
        return Err(Error::SnapshotEmpty {
            symbol: symbol.to_string(),
        });
    }

    let (bids, asks) = snapshot.parse_levels()?;
    let book = OrderBook::from_levels(symbol, snapshot.last_update_id, &bids, &asks);

    if book.is_empty() {
        return Err(Error::SnapshotEmpty {
            symbol: symbol.to_string(),
        });
    }

    Ok(book)
}

impl SnapshotLoader for RestClient {
    async fn load_snapshot(&self, symbol: &str) -> Result<OrderBook, Error> {
        let snapshot = self.get_depth_snapshot(symbol, self.depth_limit).await?;
        book_from_snapshot(symbol, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(json: &str) -> DepthSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_book_from_snapshot() {
        let snap = snapshot(
            r#"{"lastUpdateId": 1000,
                "bids": [["100.00", "5"], ["99.00", "1"]],
                "asks": [["101.00", "2"]]}"#,
        );

        let book = book_from_snapshot("BTCUSDT", &snap).unwrap();
        assert_eq!(book.last_update_id(), 1000);
        assert_eq!(book.best_bid(), Some((dec!(100), dec!(5))));
        assert_eq!(book.best_ask(), Some((dec!(101), dec!(2))));
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = snapshot(r#"{"lastUpdateId": 5, "bids": [], "asks": []}"#);
        assert!(matches!(
            book_from_snapshot("NOPEUSDT", &snap),
            Err(Error::SnapshotEmpty { .. })
        ));

        let zeros = snapshot(r#"{"lastUpdateId": 5, "bids": [["1", "0"]], "asks": []}"#);
        assert!(matches!(
            book_from_snapshot("NOPEUSDT", &zeros),
            Err(Error::SnapshotEmpty { .. })
        ));
    }

    #[test]
    fn test_malformed_level() {
        let snap = snapshot(r#"{"lastUpdateId": 5, "bids": [["1.0", "x"]], "asks": []}"#);
        assert!(matches!(
            book_from_snapshot("BTCUSDT", &snap),
            Err(Error::SnapshotParse(_))
        ));
    }

    #[test]
    fn test_url_building() {
        let config = Config::new("BTCUSDT");
        let client = RestClient::with_base_url(&config, "http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");

        let url = client
            .url("/api/v3/depth", &[("symbol", "BTCUSDT"), ("limit", "100")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v3/depth?symbol=BTCUSDT&limit=100"
        );
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

        match rate_limit_error(StatusCode::TOO_MANY_REQUESTS, &headers) {
            Some(FetchError::RateLimited {
                status,
                retry_after_secs,
            }) => {
                assert_eq!(status, 429);
                assert_eq!(retry_after_secs, Some(7));
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }

        // Banned IPs get 418, with or without the header
        assert!(matches!(
            rate_limit_error(StatusCode::IM_A_TEAPOT, &HeaderMap::new()),
            Some(FetchError::RateLimited {
                status: 418,
                retry_after_secs: None,
            })
        ));

        assert!(rate_limit_error(StatusCode::BAD_REQUEST, &headers).is_none());
        assert!(rate_limit_error(StatusCode::OK, &headers).is_none());
    }

    #[test]
    fn test_status_error_extracts_binance_msg() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"code": -1121, "msg": "Invalid symbol."}"#,
        );
        match err {
            FetchError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid symbol.");
            }
            other => panic!("Expected Status, got {:?}", other),
        }

        let err = status_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(
            err,
            FetchError::Status { status: 502, ref message } if message == "<html>bad gateway</html>"
        ));
    }
}
