//! Structured error body returned by the server
//!
//! Every non-2xx REST response carries a `{code, message}` body. The
//! dispatcher decodes it and surfaces it unchanged so callers can branch
//! on the machine-readable code.

use serde::{Deserialize, Serialize};

/// Decoded `{code, message}` error body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Create an error from parts
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Decode from a raw response body, falling back to an opaque error
    /// when the body is not the structured shape (e.g. an HTML error page
    /// from an intermediary proxy).
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self {
            code: format!("HTTP_{status}"),
            message: String::from_utf8_lossy(body).into_owned(),
        })
    }
}
