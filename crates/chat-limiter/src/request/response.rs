//! Transport response and rate-limit header fields

use serde::de::DeserializeOwned;
use std::time::Duration;

/// Rate-limit header names consumed from every REST response
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const HEADER_BUCKET: &str = "x-ratelimit-bucket";
pub const HEADER_GLOBAL: &str = "x-ratelimit-global";

/// Rate-limit fields decoded from response headers
///
/// All fields are optional; a response without them leaves the bucket's
/// state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// Window size the server enforces for this bucket
    pub limit: Option<i64>,
    /// Tickets left in the current window
    pub remaining: Option<i64>,
    /// Seconds until the window resets
    pub reset_after: Option<f64>,
    /// Opaque bucket hash; reveals routes that share one quota
    pub bucket: Option<String>,
    /// Whether a 429 applies to every bucket at once
    pub global: bool,
}

impl RateLimitHeaders {
    /// Build from a header lookup function
    ///
    /// The lookup receives lowercase header names; both the reqwest
    /// transport and test mocks feed this.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            limit: lookup(HEADER_LIMIT).and_then(|v| v.parse().ok()),
            remaining: lookup(HEADER_REMAINING).and_then(|v| v.parse().ok()),
            reset_after: lookup(HEADER_RESET_AFTER).and_then(|v| v.parse().ok()),
            bucket: lookup(HEADER_BUCKET),
            global: lookup(HEADER_GLOBAL)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }

    /// The reset-after field as a duration
    #[must_use]
    pub fn reset_after_duration(&self) -> Option<Duration> {
        self.reset_after
            .filter(|secs| *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Response produced by the transport for one attempt
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub rate: RateLimitHeaders,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Check for any 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    /// Returns the serde error when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
