//! Gateway error types

use crate::session::ConnectionState;
use chat_limiter::RequestError;
use std::time::Duration;
use thiserror::Error;

/// Error surfaced by the session manager
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Opening the socket failed
    #[error("failed to connect to gateway: {0}")]
    Connect(String),

    /// The server did not send Hello in time; fatal for this attempt
    #[error("no Hello received within {0:?}")]
    HelloTimeout(Duration),

    /// Connect/disconnect called in a state that does not allow it
    #[error("invalid connection state: {0}")]
    InvalidState(ConnectionState),

    /// A dispatcher-routed call failed (gateway URL fetch, admission)
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A gateway payload did not match the expected shape
    #[error("failed to decode gateway payload: {0}")]
    Decode(#[from] serde_json::Error),
}
