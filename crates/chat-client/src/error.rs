//! Client error types

use chat_common::ConfigError;
use chat_gateway::GatewayError;
use chat_limiter::RequestError;
use thiserror::Error;

/// Error surfaced by the client facade
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration is missing or malformed
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dispatcher-routed REST call failed
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The gateway session manager failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A response body did not match the expected entity shape
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The underlying HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Http(String),
}
