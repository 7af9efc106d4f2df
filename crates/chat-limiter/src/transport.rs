//! Transport seam
//!
//! The dispatcher owns admission and retry; actual I/O goes through this
//! trait. Production uses the reqwest-backed implementation in
//! `chat-client`; tests script responses through a mock.

use crate::request::{Request, TransportResponse};
use async_trait::async_trait;

/// Performs the underlying I/O for one request attempt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one attempt and decode the response envelope
    ///
    /// Non-2xx statuses are returned as responses, not errors; the
    /// dispatcher interprets them. Errors are reserved for failures that
    /// produced no response at all.
    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError>;
}

/// Failure that produced no response
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Other(String),
}
