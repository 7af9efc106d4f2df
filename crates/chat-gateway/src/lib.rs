//! # chat-gateway
//!
//! Gateway session manager: the WebSocket connection state machine that
//! establishes, heartbeats, resumes, and reconnects the real-time event
//! stream. All gateway sends share admission logic with REST through the
//! dispatcher's gateway bucket.

pub mod error;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod session;

// Re-export commonly used types at crate root
pub use error::GatewayError;
pub use events::{DisconnectReason, EventBus, EventKind, EventSubscription, GatewayEvent};
pub use manager::{ResumeState, SessionManager};
pub use protocol::{CloseCode, EventEnvelope, FrameType, GatewayFrame, HelloPayload};
pub use session::{ConnectionState, GatewaySession};
