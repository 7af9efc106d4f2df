//! WebSocket close codes
//!
//! Close codes the server (or this client) attaches when tearing down the
//! socket, and the client-side interpretation: whether reconnecting is
//! worthwhile at all, and whether the prior session can still be resumed.

use serde::{Deserialize, Serialize};

/// Code used for a deliberate, final close
pub const NORMAL_CLOSE: u16 = 1000;

/// Code used when the close is itself a reconnect handoff, so the server
/// can distinguish deliberate reconnects from faults
pub const RECONNECT_CLOSE: u16 = 4000;

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Either side is closing in order to reconnect
    Reconnecting = 4000,
    /// Invalid frame type sent
    UnknownFrameType = 4001,
    /// Invalid payload encoding (JSON decode error)
    DecodeError = 4002,
    /// Invalid token provided
    AuthenticationFailed = 4004,
    /// Invalid sequence number for resume
    InvalidSequence = 4007,
    /// Too many frames (rate limited)
    RateLimited = 4008,
    /// Session has timed out and cannot be resumed
    SessionTimeout = 4009,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::Reconnecting),
            4001 => Some(Self::UnknownFrameType),
            4002 => Some(Self::DecodeError),
            4004 => Some(Self::AuthenticationFailed),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        // A bad token will stay bad; everything else is worth another try
        !matches!(self, Self::AuthenticationFailed)
    }

    /// Check if the prior session is still resumable after this close
    #[must_use]
    pub const fn should_resume(self) -> bool {
        matches!(
            self,
            Self::Reconnecting | Self::UnknownFrameType | Self::DecodeError | Self::RateLimited
        )
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Reconnecting => "Reconnecting",
            Self::UnknownFrameType => "Invalid frame type sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::AuthenticationFailed => "Authentication failed",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
