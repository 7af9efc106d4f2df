//! Client configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Bearer token used to authenticate every REST call and gateway identify
    pub token: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    pub rest: RestConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// REST transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    /// Base URL of the REST API, without a trailing slash
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RestConfig {
    /// Per-request timeout for the underlying HTTP client
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Fixed gateway URL. When unset the client asks the REST API for one
    /// before each connect.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Backoff applied when a bucket is over quota before the server has
    /// taught it a reset time
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,
    /// Margin added to server reset times to absorb clock skew
    #[serde(default = "default_clock_skew_lag_ms")]
    pub clock_skew_lag_ms: u64,
    /// How often the sweep evicts idle buckets
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// A bucket unused for longer than this is evicted
    #[serde(default = "default_bucket_idle_secs")]
    pub bucket_idle_secs: u64,
}

impl LimiterConfig {
    #[must_use]
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    #[must_use]
    pub fn clock_skew_lag(&self) -> Duration {
        Duration::from_millis(self.clock_skew_lag_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub fn bucket_idle(&self) -> Duration {
        Duration::from_secs(self.bucket_idle_secs)
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: default_min_backoff_ms(),
            clock_skew_lag_ms: default_clock_skew_lag_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            bucket_idle_secs: default_bucket_idle_secs(),
        }
    }
}

/// Message cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_message_capacity")]
    pub message_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            message_capacity: default_message_capacity(),
        }
    }
}

// Default value functions
fn default_env() -> Environment {
    Environment::Development
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_hello_timeout_ms() -> u64 {
    10_000
}

fn default_min_backoff_ms() -> u64 {
    750
}

fn default_clock_skew_lag_ms() -> u64 {
    500
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_bucket_idle_secs() -> u64 {
    60
}

fn default_message_capacity() -> usize {
    1000
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            token: env::var("CHAT_TOKEN").map_err(|_| ConfigError::MissingVar("CHAT_TOKEN"))?,
            env: env::var("CHAT_ENV")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "production" => Some(Environment::Production),
                    "staging" => Some(Environment::Staging),
                    "development" => Some(Environment::Development),
                    _ => None,
                })
                .unwrap_or_default(),
            rest: RestConfig {
                base_url: env::var("CHAT_API_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .map_err(|_| ConfigError::MissingVar("CHAT_API_URL"))?,
                request_timeout_secs: env_or("CHAT_REQUEST_TIMEOUT_SECS", default_request_timeout_secs),
            },
            gateway: GatewayConfig {
                url: env::var("CHAT_GATEWAY_URL").ok(),
                heartbeat_interval_ms: env_or(
                    "CHAT_HEARTBEAT_INTERVAL_MS",
                    default_heartbeat_interval_ms,
                ),
                hello_timeout_ms: env_or("CHAT_HELLO_TIMEOUT_MS", default_hello_timeout_ms),
            },
            limiter: LimiterConfig {
                min_backoff_ms: env_or("CHAT_LIMITER_MIN_BACKOFF_MS", default_min_backoff_ms),
                clock_skew_lag_ms: env_or("CHAT_LIMITER_CLOCK_SKEW_LAG_MS", default_clock_skew_lag_ms),
                sweep_interval_secs: env_or("CHAT_LIMITER_SWEEP_INTERVAL_SECS", default_sweep_interval_secs),
                bucket_idle_secs: env_or("CHAT_LIMITER_BUCKET_IDLE_SECS", default_bucket_idle_secs),
            },
            cache: CacheConfig {
                message_capacity: env_or("CHAT_MESSAGE_CACHE_CAPACITY", default_message_capacity),
            },
        })
    }
}

/// Parse an env var, falling back to the default when unset or malformed
fn env_or<T: std::str::FromStr>(name: &str, default: fn() -> T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
