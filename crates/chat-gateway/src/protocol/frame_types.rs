//! Gateway frame types
//!
//! Defines the signal codes carried in the `s` field of every gateway
//! frame.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway frame types
///
/// The `s` field of a frame names what the `d` payload means and which
/// side may send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Server dispatches an event to the client (server only)
    Event = 0,
    /// Hello - sent once after the socket opens, carries the session id
    /// (server only)
    Hello = 1,
    /// Ping - heartbeat with the client's last received sequence (client only)
    Ping = 2,
    /// Pong - heartbeat acknowledgement (server only)
    Pong = 3,
    /// Resume - request event replay from a sequence (client only)
    Resume = 4,
    /// Reconnect - server requests the client drop and reconnect (server only)
    Reconnect = 5,
    /// ResumeAck - resume accepted, replay follows (server only)
    ResumeAck = 6,
}

impl FrameType {
    /// Create a `FrameType` from a raw integer value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Event),
            1 => Some(Self::Hello),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Resume),
            5 => Some(Self::Reconnect),
            6 => Some(Self::ResumeAck),
            _ => None,
        }
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this frame type can be sent by the client
    #[must_use]
    pub const fn is_client_frame(self) -> bool {
        matches!(self, Self::Ping | Self::Resume)
    }

    /// Check if this frame type can be sent by the server
    #[must_use]
    pub const fn is_server_frame(self) -> bool {
        matches!(
            self,
            Self::Event | Self::Hello | Self::Pong | Self::Reconnect | Self::ResumeAck
        )
    }

    /// Get the name of this frame type
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::Hello => "Hello",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::ResumeAck => "ResumeAck",
        }
    }
}

impl Serialize for FrameType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for FrameType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid frame type: {value}")))
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
