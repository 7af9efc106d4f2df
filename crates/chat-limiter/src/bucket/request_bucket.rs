//! Per-bucket quota state
//!
//! One [`RequestBucket`] owns the quota window for one bucket id. State is
//! a handful of scalars mutated under the bucket's own lock; no critical
//! section spans I/O. Admission is a take/put counting discipline: a
//! caller that takes the last ticket is admitted, a caller that would push
//! the count negative is blocked until the window resets.

use super::Window;
use crate::events::RateLimitInfo;
use crate::request::RateLimitHeaders;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A ticket was taken; the caller may send
    Admitted,
    /// Over quota. `until` is the known reset time, or `None` when the
    /// server has not yet taught this bucket a reset
    Blocked { until: Option<Instant> },
}

#[derive(Debug)]
struct BucketState {
    /// Tickets left in the current window; signed so server corrections
    /// and redirect penalties can push it below zero
    remaining: i64,
    window: Window,
    reset_at: Option<Instant>,
    last_attempt: Instant,
    /// Whether any response has taught this bucket its real limits
    taught: bool,
}

/// Quota state for one bucket id
#[derive(Debug)]
pub struct RequestBucket {
    state: Mutex<BucketState>,
}

impl RequestBucket {
    /// Create a bucket with the given window, fully refilled
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            state: Mutex::new(BucketState {
                remaining: window.count,
                window,
                reset_at: None,
                last_attempt: Instant::now(),
                taught: false,
            }),
        }
    }

    /// Attempt to take one admission ticket
    ///
    /// Refills the window first if a known reset time has passed. For
    /// self-clocked windows (static definitions with a nonzero length) the
    /// first ticket of a fresh window starts the reset timer.
    pub fn try_take(&self, now: Instant) -> Admission {
        let mut state = self.state.lock();
        state.last_attempt = now;

        if let Some(reset) = state.reset_at {
            if now >= reset {
                state.remaining = state.window.count;
                state.reset_at = None;
            }
        }

        if state.remaining > 0 {
            state.remaining -= 1;
            if state.reset_at.is_none() && state.window.seconds > 0 {
                state.reset_at = Some(now + Duration::from_secs(state.window.seconds));
            }
            Admission::Admitted
        } else {
            Admission::Blocked {
                until: state.reset_at,
            }
        }
    }

    /// Apply rate-limit fields from a response
    ///
    /// The server is authoritative: limit replaces the window size,
    /// remaining replaces the local count, and reset-after restarts the
    /// reset timer from `now`. A response that carries no rate fields at
    /// all returns its ticket to a still-untaught conservative bucket, so
    /// an endpoint the server never limits degrades to one-in-flight
    /// serialization instead of starving.
    pub fn update(&self, rate: &RateLimitHeaders, now: Instant) {
        let mut state = self.state.lock();
        let taught =
            rate.limit.is_some() || rate.remaining.is_some() || rate.reset_after.is_some();

        if taught {
            state.taught = true;
            if let Some(limit) = rate.limit {
                state.window.count = limit;
            }
            if let Some(remaining) = rate.remaining {
                state.remaining = remaining;
            }
            if let Some(reset_after) = rate.reset_after_duration() {
                state.reset_at = Some(now + reset_after);
            }
        } else if !state.taught && state.window.seconds == 0 {
            state.remaining = (state.remaining + 1).min(state.window.count);
        }
    }

    /// Consume one ticket without admission
    ///
    /// Used when a route converges onto an existing hash bucket: the
    /// in-flight request already holds a ticket from its old bucket, so
    /// the target's count is decremented once to account for it.
    pub fn penalize(&self) {
        self.state.lock().remaining -= 1;
    }

    /// Time of the most recent admission attempt
    pub fn last_attempt(&self) -> Instant {
        self.state.lock().last_attempt
    }

    /// Snapshot the current limit state for observers
    pub fn info(&self, now: Instant) -> RateLimitInfo {
        let state = self.state.lock();
        RateLimitInfo {
            limit: Some(state.window.count),
            remaining: Some(state.remaining),
            reset_after: state
                .reset_at
                .map(|reset| reset.saturating_duration_since(now)),
        }
    }

    /// Current window definition
    pub fn window(&self) -> Window {
        self.state.lock().window
    }
}
