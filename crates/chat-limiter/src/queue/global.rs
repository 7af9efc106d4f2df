//! Global pause gate
//!
//! A second tier of quota above individual buckets: when the server flags
//! a 429 as global, every send is paused until the reset passes. Written
//! only on a global 429, read before every send.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct GlobalGate {
    paused_until: Mutex<Option<Instant>>,
}

impl GlobalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the pause to `until`; an earlier pause is never shortened
    pub fn pause_until(&self, until: Instant) {
        let mut paused = self.paused_until.lock();
        if paused.is_none_or(|current| until > current) {
            *paused = Some(until);
        }
    }

    /// Remaining pause time, or `None` when sends may proceed
    ///
    /// An expired pause is cleared as a side effect.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let mut paused = self.paused_until.lock();
        match *paused {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                *paused = None;
                None
            }
            None => None,
        }
    }

    /// Check if a pause is currently active
    pub fn is_paused(&self, now: Instant) -> bool {
        self.remaining(now).is_some()
    }
}
