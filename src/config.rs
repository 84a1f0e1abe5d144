//! Configuration for the depth mirror.
//!
//! This module provides the [`Config`] struct (symbol, depths, buffer size,
//! endpoints) and [`RetryConfig`], the snapshot retry policy.

use std::time::Duration;

use rand::Rng;

/// Binance environment (production or spot testnet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production spot market
    #[default]
    Production,
    /// Spot testnet
    Testnet,
}

impl Environment {
    /// Get the base URL for the REST API
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.binance.com",
            Environment::Testnet => "https://testnet.binance.vision",
        }
    }

    /// Get the WebSocket raw-stream base URL
    pub fn websocket_url(&self) -> &'static str {
        match self {
            Environment::Production => "wss://stream.binance.com:9443/ws",
            Environment::Testnet => "wss://stream.testnet.binance.vision/ws",
        }
    }
}

/// Push interval of the diff-depth stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateSpeed {
    /// `<symbol>@depth` (1000ms)
    #[default]
    Standard,
    /// `<symbol>@depth@100ms`
    Fast,
}

/// Configuration for one symbol's depth mirror
///
/// # Example
///
/// ```rust
/// use binance_depthbook::Config;
/// use binance_depthbook::config::Environment;
///
/// let config = Config::new("BTCUSDT");
/// assert_eq!(config.depth_limit(), 100);
/// assert_eq!(config.display_depth(), 5);
///
/// let testnet = Config::new("ETHUSDT")
///     .with_environment(Environment::Testnet)
///     .with_display_depth(10);
/// assert!(testnet.rest_base_url().contains("testnet"));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading pair, e.g. `BTCUSDT`
    symbol: String,

    /// API environment
    environment: Environment,

    /// Number of levels requested in the REST snapshot
    depth_limit: u32,

    /// Number of levels shown per side by the view
    display_depth: usize,

    /// Events kept while waiting for a snapshot
    buffer_capacity: usize,

    /// HTTP request timeout
    timeout: Duration,

    /// Diff stream push interval
    update_speed: UpdateSpeed,

    /// Snapshot retry policy
    retry: RetryConfig,
}

impl Config {
    /// Depth limits accepted by `GET /api/v3/depth`
    pub const VALID_DEPTH_LIMITS: [u32; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];

    /// Create a configuration for the given symbol with default settings
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            environment: Environment::default(),
            depth_limit: 100,
            display_depth: 5,
            buffer_capacity: 1000,
            timeout: Duration::from_secs(10),
            update_speed: UpdateSpeed::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Set the API environment
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the snapshot depth limit
    #[must_use]
    pub fn with_depth_limit(mut self, depth_limit: u32) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    /// Set the number of levels shown per side
    #[must_use]
    pub fn with_display_depth(mut self, display_depth: usize) -> Self {
        self.display_depth = display_depth;
        self
    }

    /// Set the pre-snapshot event buffer capacity
    #[must_use]
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Set the HTTP request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the diff stream push interval
    #[must_use]
    pub fn with_update_speed(mut self, update_speed: UpdateSpeed) -> Self {
        self.update_speed = update_speed;
        self
    }

    /// Set the snapshot retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check the settings the exchange would otherwise reject
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] for an empty symbol, an unsupported
    /// depth limit, or a zero buffer capacity.
    pub fn validate(&self) -> crate::Result<()> {
        if self.symbol.is_empty() {
            return Err(crate::Error::Config("symbol must not be empty".to_string()));
        }
        if !Self::VALID_DEPTH_LIMITS.contains(&self.depth_limit) {
            return Err(crate::Error::Config(format!(
                "depth limit {} not one of {:?}",
                self.depth_limit,
                Self::VALID_DEPTH_LIMITS
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(crate::Error::Config(
                "buffer capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the symbol (upper case)
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the environment
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Get the REST API base URL
    pub fn rest_base_url(&self) -> &'static str {
        self.environment.rest_base_url()
    }

    /// Get the full diff-depth stream URL for the configured symbol
    pub fn stream_url(&self) -> String {
        let suffix = match self.update_speed {
            UpdateSpeed::Standard => "",
            UpdateSpeed::Fast => "@100ms",
        };
        format!(
            "{}/{}@depth{}",
            self.environment.websocket_url(),
            self.symbol.to_lowercase(),
            suffix
        )
    }

    /// Get the snapshot depth limit
    pub fn depth_limit(&self) -> u32 {
        self.depth_limit
    }

    /// Get the display depth
    pub fn display_depth(&self) -> usize {
        self.display_depth
    }

    /// Get the event buffer capacity
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Get the timeout duration
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the update speed
    pub fn update_speed(&self) -> UpdateSpeed {
        self.update_speed
    }

    /// Get the retry policy
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

/// Retry policy for snapshot requests
///
/// Delay for attempt `n` is `initial_delay_ms * backoff_multiplier^n`, capped
/// at `max_delay_ms`, then spread by `±jitter_factor`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = infinite)
    pub max_retries: u32,
    /// Initial delay between attempts
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 250,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retries (0 = infinite)
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay in milliseconds
    pub fn initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    /// Set maximum delay in milliseconds
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set backoff multiplier
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor. Values outside `0.0..=1.0` are clamped.
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries == 0 || attempt < self.max_retries
    }

    /// Calculate the un-jittered delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }

    /// Calculate the delay for a given retry attempt with jitter applied
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let range = base.as_secs_f64() * self.jitter_factor;
        if range <= 0.0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64((base.as_secs_f64() + jitter).max(0.0))
    }
}
