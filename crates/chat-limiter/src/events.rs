//! Rate-limit telemetry events

use crate::bucket::BucketId;
use std::time::Duration;

/// Snapshot of a bucket's limit state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub reset_after: Option<Duration>,
}

/// Fired once per admission stall so observers can log or apply
/// backpressure without being flooded by the retry loop
#[derive(Debug, Clone)]
pub struct RateLimitEvent {
    /// Bucket that stalled the request
    pub bucket: BucketId,
    /// Limit state at the time of the stall, when known
    pub info: Option<RateLimitInfo>,
    /// Human-readable endpoint description
    pub endpoint: String,
}

impl std::fmt::Display for RateLimitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rate limit triggered on {} ({})", self.bucket, self.endpoint)
    }
}
