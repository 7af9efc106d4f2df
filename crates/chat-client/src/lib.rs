//! # chat-client
//!
//! Client facade: wires the reqwest transport into the rate-limited
//! dispatcher, the dispatcher into the gateway session manager, and the
//! gateway's message events into the bounded cache. Applications talk to
//! [`ChatClient`] and the [`MessageChannel`] objects it hands out.

pub mod channel;
pub mod client;
pub mod error;
pub mod reconnect;
pub mod routes;
pub mod transport;

// Re-export commonly used types at crate root
pub use channel::MessageChannel;
pub use client::ChatClient;
pub use error::ClientError;
pub use reconnect::ReconnectPolicy;
pub use transport::RestTransport;

// The facade's own vocabulary, re-exported for applications
pub use chat_cache::Direction;
pub use chat_common::ClientConfig;
pub use chat_core::{CurrentUser, Message, Snowflake};
pub use chat_gateway::{
    ConnectionState, DisconnectReason, EventKind, EventSubscription, GatewayEvent,
};
pub use chat_limiter::{RateLimitEvent, RetryMode};
