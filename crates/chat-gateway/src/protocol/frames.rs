//! Gateway frame format
//!
//! All messages on the WebSocket are JSON frames of the shape
//! `{ "s": <frame type>, "sn": <sequence?>, "d": <payload?> }`.

use super::{EventEnvelope, FrameType, HelloPayload, ResumeAckPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One gateway frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Frame type
    pub s: FrameType,

    /// Sequence number (Event frames from the server; echoed back on Ping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sn: Option<u64>,

    /// Frame payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayFrame {
    // === Client frames ===

    /// Create a Ping frame carrying the last received sequence
    #[must_use]
    pub fn ping(last_sequence: Option<u64>) -> Self {
        Self {
            s: FrameType::Ping,
            sn: last_sequence,
            d: None,
        }
    }

    /// Create a Resume frame requesting replay from a sequence
    #[must_use]
    pub fn resume(session_id: impl Into<String>, last_sequence: u64) -> Self {
        Self {
            s: FrameType::Resume,
            sn: Some(last_sequence),
            d: Some(serde_json::json!({ "session_id": session_id.into() })),
        }
    }

    // === Parsing server frames ===

    /// Try to parse as a Hello payload
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.s != FrameType::Hello {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse as an event envelope
    pub fn as_event(&self) -> Option<EventEnvelope> {
        if self.s != FrameType::Event {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse as a ResumeAck payload
    pub fn as_resume_ack(&self) -> Option<ResumeAckPayload> {
        if self.s != FrameType::ResumeAck {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayFrame(s={}", self.s)?;
        if let Some(sn) = self.sn {
            write!(f, ", sn={sn}")?;
        }
        write!(f, ")")
    }
}
