//! Static rate definitions
//!
//! Windows known ahead of any server response. Everything else starts from
//! the conservative default of one in-flight request until the first
//! response teaches the bucket its real window.

use super::BucketId;

/// Quota window for one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Requests admitted per window
    pub count: i64,
    /// Window length in seconds; `0` means the length is unknown and the
    /// bucket only refills when a response provides a reset time
    pub seconds: u64,
}

impl Window {
    /// Create a window definition
    #[must_use]
    pub const fn new(count: i64, seconds: u64) -> Self {
        Self { count, seconds }
    }

    /// Conservative window used for buckets with no static definition
    #[must_use]
    pub const fn conservative() -> Self {
        Self::new(1, 0)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.count, self.seconds)
    }
}

/// Look up the static window for a bucket id, if one is defined
#[must_use]
pub fn static_definition(id: &BucketId) -> Option<Window> {
    match id {
        BucketId::Gateway => Some(Window::new(120, 60)),
        BucketId::Client(name) => match *name {
            "send-edit" => Some(Window::new(5, 5)),
            "identify" => Some(Window::new(1, 5)),
            _ => None,
        },
        _ => None,
    }
}
