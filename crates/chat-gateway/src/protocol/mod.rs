//! Gateway wire protocol
//!
//! Frame format, frame types, close codes, and the structured payloads
//! the session manager decodes.

mod close_codes;
mod frame_types;
mod frames;
mod payloads;

pub use close_codes::{CloseCode, NORMAL_CLOSE, RECONNECT_CLOSE};
pub use frame_types::FrameType;
pub use frames::GatewayFrame;
pub use payloads::{EventEnvelope, GatewayInfo, HelloPayload, ResumeAckPayload};
