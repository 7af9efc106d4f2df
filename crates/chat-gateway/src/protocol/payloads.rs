//! Structured frame payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hello payload - the first structured frame after the socket opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Server-assigned session id; required for a later resume
    pub session_id: String,
}

/// Event payload envelope
///
/// The event name selects which entity the opaque `data` decodes into;
/// the session manager forwards the envelope to subscribers untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event name, e.g. `MESSAGE_CREATE`
    pub event: String,
    /// Opaque event payload
    pub data: Value,
}

/// ResumeAck payload - the server accepted a resume request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAckPayload {
    pub session_id: String,
}

/// Body of `GET /gateway/index` - where to open the WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}
