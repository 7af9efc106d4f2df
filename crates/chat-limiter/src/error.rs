//! Dispatcher error types

use crate::bucket::BucketId;
use crate::transport::TransportError;
use chat_core::ApiError;
use std::time::Duration;
use thiserror::Error;

/// Error surfaced by [`RequestQueue::enqueue`](crate::RequestQueue::enqueue)
///
/// Callers see either a decoded response or exactly one of these; partial
/// responses never escape the dispatcher.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Socket-level failure; retried only per explicit retry flags
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Over quota and the deadline (or retry policy) forbids waiting it out
    #[error("rate limited on bucket {bucket}")]
    RateLimited {
        bucket: BucketId,
        /// How long the server asked us to wait, when known
        retry_after: Option<Duration>,
    },

    /// Non-2xx response with a decoded `{code, message}` body; never
    /// retried automatically
    #[error("server rejected request ({status}): {error}")]
    Rejected { status: u16, error: ApiError },

    /// Deadline exceeded
    #[error("request deadline exceeded")]
    Timeout,

    /// The request's cancellation token fired
    #[error("request cancelled")]
    Cancelled,

    /// 2xx response whose body did not match the expected shape
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    /// Check if this is a rate-limit error
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The decoded server error, when the server rejected the request
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }
}
