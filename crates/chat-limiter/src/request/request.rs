//! Outbound request description

use crate::bucket::BucketId;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// HTTP method of a REST request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Get the method name as sent on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// Which failures the dispatcher retries internally
    ///
    /// Everything else propagates to the caller as a typed error on the
    /// first occurrence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RetryMode: u8 {
        /// Retry when the transport times out
        const TIMEOUT = 1 << 0;
        /// Sleep out 429 responses and admission stalls, bounded by the
        /// deadline
        const RATE_LIMIT = 1 << 1;
        /// Retry 502 responses from intermediaries
        const BAD_GATEWAY = 1 << 2;
    }
}

impl Default for RetryMode {
    /// Rate limits are absorbed by default; timeouts and 502s surface
    fn default() -> Self {
        Self::RATE_LIMIT
    }
}

/// Per-request dispatch options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub retry: RetryMode,
    /// Absolute deadline checked at every retry iteration
    pub deadline: Option<Instant>,
    /// Cancelling this token aborts the request at its next suspension
    /// point
    pub cancellation: CancellationToken,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            retry: RetryMode::default(),
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl RequestOptions {
    /// Set an absolute deadline
    #[must_use]
    pub fn timeout_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the retry flags
    #[must_use]
    pub fn retry(mut self, retry: RetryMode) -> Self {
        self.retry = retry;
        self
    }

    /// Tie the request to a cancellation scope
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// One outbound REST request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path relative to the API base URL, already rendered
    pub path: String,
    pub body: Option<Value>,
    pub bucket: BucketId,
    pub options: RequestOptions,
}

impl Request {
    /// Create a request with default options and no bucket grouping
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bucket: BucketId::Unbucketed,
            options: RequestOptions::default(),
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Assign the target bucket
    #[must_use]
    pub fn with_bucket(mut self, bucket: BucketId) -> Self {
        self.bucket = bucket;
        self
    }

    /// Replace the dispatch options
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Human-readable endpoint description for logs and telemetry
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}
